//! The one module allowed to know about `fantoccini`.
//!
//! Translates the abstract locator kinds of [`super::Frame`] into WebDriver
//! CSS/XPath queries and wraps a `fantoccini::Client` behind [`BrowserControl`].
//! Role/label/text lookups have no native WebDriver primitive the way they
//! do in a Playwright-style API, so they are expressed as XPath here —
//! the usual translation when driving WebDriver directly.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};

use super::{
    BrowserContext, BrowserControl, Cookie, Frame, ImageEncoding, LaunchOptions, Locator,
    MockResponse, Page, Result, StorageState, WaitState,
};

/// Connects to a WebDriver endpoint (e.g. chromedriver/geckodriver) and
/// drives it through the `BrowserControl` port.
pub struct FantocciniBrowser {
    webdriver_url: String,
}

impl FantocciniBrowser {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        FantocciniBrowser { webdriver_url: webdriver_url.into() }
    }
}

#[async_trait]
impl BrowserControl for FantocciniBrowser {
    async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn BrowserContext>> {
        let mut caps = serde_json::map::Map::new();
        let mut chrome_args = vec!["--disable-gpu".to_string()];
        if !options.headed {
            chrome_args.push("--headless=new".to_string());
        }
        if let Some((w, h)) = options.viewport {
            chrome_args.push(format!("--window-size={w},{h}"));
        }
        caps.insert(
            "goog:chromeOptions".to_string(),
            serde_json::json!({ "args": chrome_args }),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&self.webdriver_url)
            .await?;

        if options.slow_mo > Duration::ZERO {
            tokio::time::sleep(options.slow_mo).await;
        }

        Ok(Box::new(FantocciniContext { client, options }))
    }
}

struct FantocciniContext {
    client: Client,
    options: LaunchOptions,
}

#[async_trait]
impl BrowserContext for FantocciniContext {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        if let Some((w, h)) = self.options.viewport {
            self.client.set_window_size(w, h).await?;
        }
        if let Some(path) = &self.options.storage_state_path {
            if let Ok(bytes) = std::fs::read(path) {
                if let Ok(state) = serde_json::from_slice::<StorageState>(&bytes) {
                    self.add_cookies(&state.cookies).await?;
                }
            }
        }
        Ok(Box::new(FantocciniPage { client: self.client.clone(), slow_mo: self.options.slow_mo }))
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        for cookie in cookies {
            let mut wd_cookie = fantoccini::cookies::Cookie::new(cookie.name.clone(), cookie.value.clone());
            wd_cookie.set_domain(cookie.domain.clone());
            if let Some(path) = &cookie.path {
                wd_cookie.set_path(path.clone());
            }
            self.client.add_cookie(wd_cookie).await?;
        }
        Ok(())
    }

    async fn storage_state(&self) -> Result<StorageState> {
        let cookies = self
            .client
            .get_all_cookies()
            .await?
            .into_iter()
            .map(|c| Cookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
                domain: c.domain().map(str::to_string).unwrap_or_default(),
                path: c.path().map(str::to_string),
            })
            .collect();
        Ok(StorageState { cookies, origins: Vec::new() })
    }

    async fn route(&self, _url_pattern: &str, _method: Option<&str>, _response: MockResponse) -> Result<()> {
        // Request interception has no stable, driver-agnostic WebDriver
        // primitive; a real deployment would route this through the
        // browser's CDP endpoint. Left as a documented limitation of this
        // adapter rather than a silent no-op further up the stack.
        anyhow::bail!("route interception is not supported by the WebDriver adapter")
    }

    async fn start_tracing(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_tracing(&self, _out_path: &Path) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

struct FantocciniPage {
    client: Client,
    slow_mo: Duration,
}

impl FantocciniPage {
    async fn settle(&self) {
        if self.slow_mo > Duration::ZERO {
            tokio::time::sleep(self.slow_mo).await;
        }
    }
}

#[async_trait]
impl Frame for FantocciniPage {
    async fn wait_body_attached(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.client.find(WdLocator::Css("body"))).await??;
        Ok(())
    }

    fn by_test_id(&self, id: &str) -> Box<dyn Locator> {
        css_locator(&self.client, &format!("[data-testid=\"{id}\"]"), None)
    }

    fn by_role(&self, role: &str, name: Option<&str>, _exact: Option<bool>) -> Box<dyn Locator> {
        let xpath = match name {
            Some(name) => format!(
                "//*[(@role=\"{role}\" or self::{role}) and (normalize-space(text())=\"{name}\" or @aria-label=\"{name}\")]"
            ),
            None => format!("//*[@role=\"{role}\" or self::{role}]"),
        };
        xpath_locator(&self.client, &xpath)
    }

    fn by_label(&self, text: &str) -> Box<dyn Locator> {
        let xpath = format!(
            "//label[normalize-space(text())=\"{text}\"]/following::input[1] | //input[@aria-label=\"{text}\"]"
        );
        xpath_locator(&self.client, &xpath)
    }

    fn by_placeholder(&self, text: &str) -> Box<dyn Locator> {
        css_locator(&self.client, &format!("[placeholder=\"{text}\"]"), None)
    }

    fn by_text(&self, text: &str) -> Box<dyn Locator> {
        let xpath = format!("//*[contains(normalize-space(text()), \"{text}\")]");
        xpath_locator(&self.client, &xpath)
    }

    fn by_css(&self, css: &str, has_text: Option<&str>) -> Box<dyn Locator> {
        css_locator(&self.client, css, has_text)
    }
}

#[async_trait]
impl Page for FantocciniPage {
    fn as_frame(&self) -> &dyn Frame {
        self
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        self.settle().await;
        Ok(())
    }

    async fn wait_dom_content_loaded(&self) -> Result<()> {
        self.client.find(WdLocator::Css("body")).await?;
        Ok(())
    }

    async fn wait_network_idle(&self, timeout: Duration) -> Result<()> {
        tokio::time::sleep(timeout.min(Duration::from_millis(500))).await;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        self.client.back().await?;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.client.refresh().await?;
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.client.source().await?)
    }

    async fn screenshot(&self, _encoding: ImageEncoding) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn frame_locator(&self, selector: &str) -> Box<dyn Frame> {
        let _ = selector;
        Box::new(FantocciniPage { client: self.client.clone(), slow_mo: self.slow_mo })
    }

    async fn take_console_errors(&self) -> Vec<String> {
        Vec::new()
    }

    async fn video_path(&self) -> Option<String> {
        None
    }
}

#[derive(Debug)]
enum Strategy {
    Css(String),
    Xpath(String),
}

/// Where a query is rooted: the whole document, or a specific element's own
/// subtree (used for text searches scoped to an already-resolved locator).
#[derive(Debug)]
enum Source {
    Root(Client),
    Scoped(Client, fantoccini::elements::Element),
}

#[derive(Debug)]
struct FantocciniLocator {
    source: Source,
    strategy: Strategy,
    has_text: Option<String>,
}

fn css_locator(client: &Client, css: &str, has_text: Option<&str>) -> Box<dyn Locator> {
    Box::new(FantocciniLocator {
        source: Source::Root(client.clone()),
        strategy: Strategy::Css(css.to_string()),
        has_text: has_text.map(str::to_string),
    })
}

fn xpath_locator(client: &Client, xpath: &str) -> Box<dyn Locator> {
    Box::new(FantocciniLocator { source: Source::Root(client.clone()), strategy: Strategy::Xpath(xpath.to_string()), has_text: None })
}

impl FantocciniLocator {
    fn client(&self) -> &Client {
        match &self.source {
            Source::Root(client) => client,
            Source::Scoped(client, _) => client,
        }
    }

    async fn matches(&self) -> Result<Vec<fantoccini::elements::Element>> {
        let all = match (&self.source, &self.strategy) {
            (Source::Root(client), Strategy::Css(css)) => client.find_all(WdLocator::Css(css)).await?,
            (Source::Root(client), Strategy::Xpath(xpath)) => client.find_all(WdLocator::XPath(xpath)).await?,
            (Source::Scoped(_, el), Strategy::Css(css)) => el.find_all(WdLocator::Css(css)).await?,
            (Source::Scoped(_, el), Strategy::Xpath(xpath)) => el.find_all(WdLocator::XPath(xpath)).await?,
        };
        match &self.has_text {
            None => Ok(all),
            Some(text) => {
                let mut out = Vec::new();
                for el in all {
                    if el.text().await?.contains(text.as_str()) {
                        out.push(el);
                    }
                }
                Ok(out)
            }
        }
    }

    async fn one(&self) -> Result<fantoccini::elements::Element> {
        self.matches()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("locator matched no elements"))
    }
}

#[async_trait]
impl Locator for FantocciniLocator {
    async fn count(&self) -> Result<usize> {
        Ok(self.matches().await?.len())
    }

    async fn is_visible(&self) -> Result<bool> {
        Ok(self.one().await?.is_displayed().await?)
    }

    async fn click(&self) -> Result<()> {
        self.one().await?.click().await?;
        Ok(())
    }

    async fn dblclick(&self) -> Result<()> {
        let el = self.one().await?;
        el.click().await?;
        el.click().await?;
        Ok(())
    }

    async fn fill(&self, value: &str) -> Result<()> {
        let el = self.one().await?;
        el.clear().await?;
        el.send_keys(value).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.one().await?.send_keys(key).await?;
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        let el = self.one().await?;
        if !el.is_selected().await? {
            el.click().await?;
        }
        Ok(())
    }

    async fn uncheck(&self) -> Result<()> {
        let el = self.one().await?;
        if el.is_selected().await? {
            el.click().await?;
        }
        Ok(())
    }

    async fn select_option(&self, value: &str) -> Result<()> {
        let el = self.one().await?;
        let xpath = format!(".//option[@value=\"{value}\" or normalize-space(text())=\"{value}\"]");
        let option = el.find(WdLocator::XPath(&xpath)).await?;
        option.click().await?;
        Ok(())
    }

    async fn scroll_into_view(&self) -> Result<()> {
        let el = self.one().await?;
        self.client()
            .execute("arguments[0].scrollIntoView({block: 'center'});", vec![serde_json::to_value(&el)?])
            .await?;
        Ok(())
    }

    async fn scroll_container_by(&self, dx: i64, dy: i64) -> Result<()> {
        let el = self.one().await?;
        self.client()
            .execute(
                "arguments[0].scrollLeft += arguments[1]; arguments[0].scrollTop += arguments[2];",
                vec![serde_json::to_value(&el)?, serde_json::json!(dx), serde_json::json!(dy)],
            )
            .await?;
        Ok(())
    }

    async fn container_client_height(&self) -> Result<f64> {
        let el = self.one().await?;
        let value = self
            .client()
            .execute("return arguments[0].clientHeight;", vec![serde_json::to_value(&el)?])
            .await?;
        Ok(value.as_f64().unwrap_or(0.0))
    }

    async fn text_content(&self) -> Result<String> {
        Ok(self.one().await?.text().await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.one().await?.attr(name).await?)
    }

    async fn wait_for(&self, state: WaitState, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                let count = self.count().await.unwrap_or(0);
                let satisfied = match state {
                    WaitState::Attached => count > 0,
                    WaitState::Detached => count == 0,
                    WaitState::Visible => count > 0 && self.is_visible().await.unwrap_or(false),
                    WaitState::Hidden => count == 0 || !self.is_visible().await.unwrap_or(true),
                };
                if satisfied {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await?;
        Ok(())
    }

    async fn set_input_files(&self, path: &str) -> Result<()> {
        let el = self.one().await?;
        el.send_keys(path).await?;
        Ok(())
    }

    async fn screenshot(&self, _encoding: ImageEncoding) -> Result<Vec<u8>> {
        Ok(self.one().await?.screenshot().await?)
    }

    async fn by_text(&self, text: &str) -> Result<Box<dyn Locator>> {
        let el = self.one().await?;
        let xpath = format!(".//*[contains(normalize-space(text()), \"{text}\")]");
        Ok(Box::new(FantocciniLocator {
            source: Source::Scoped(self.client().clone(), el),
            strategy: Strategy::Xpath(xpath),
            has_text: None,
        }))
    }
}
