//! Built-in step handlers (§4.5) — registered under their YAML `kind` name.
//!
//! Every handler follows "resolve (if selector-bearing), perform, raise on
//! failure", mirroring the contract the pre-existing `executors::http`/
//! `executors::wait` modules used for HTTP assertions, now generalized to
//! page interactions via the `browser` port instead of `reqwest`.

mod assertion;
mod capture;
mod composite;
mod debug;
mod interaction;
mod mock;
mod session;
mod waiting;

use std::time::Duration;

use crate::browser::WaitState;
use crate::registry::StepRegistry;
use crate::schema::Selector;

pub fn register_builtin(registry: &mut StepRegistry) {
    interaction::register(registry);
    waiting::register(registry);
    assertion::register(registry);
    capture::register(registry);
    debug::register(registry);
    session::register(registry);
    mock::register(registry);
    composite::register(registry);
}

fn deserialize_params<T: serde::de::DeserializeOwned>(params: &serde_yaml::Value) -> anyhow::Result<T> {
    serde_yaml::from_value(params.clone()).map_err(|e| anyhow::anyhow!("invalid step parameters: {e}"))
}

fn parse_wait_state(state: &str) -> anyhow::Result<WaitState> {
    match state {
        "visible" => Ok(WaitState::Visible),
        "hidden" => Ok(WaitState::Hidden),
        "attached" => Ok(WaitState::Attached),
        "detached" => Ok(WaitState::Detached),
        other => Err(anyhow::anyhow!("unknown wait state '{other}'")),
    }
}

fn timeout_or(timeout_ms: Option<u64>, default: Duration) -> Duration {
    timeout_ms.map(Duration::from_millis).unwrap_or(default)
}

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, serde::Deserialize)]
struct SelectorOnly {
    by: Selector,
}

#[cfg(test)]
mod shared_test_support {
    use super::*;
    use crate::browser::{BrowserContext, Frame, ImageEncoding, Locator, Page};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// A minimal fake `Page`/`Frame`/`Locator` stack shared by every
    /// handler's unit tests, keyed on selector kind+key the same way
    /// `selector::tests::FakeFrame` is. Locators own their recording handle
    /// instead of borrowing the page, so they stay `'static`.
    #[derive(Default)]
    pub struct FakePage {
        pub elements: HashMap<(&'static str, String), (usize, bool)>,
        pub actions: Arc<Mutex<Vec<String>>>,
        pub console_errors: Vec<String>,
    }

    #[derive(Debug)]
    pub struct RecordingLocator {
        pub actions: Arc<Mutex<Vec<String>>>,
        pub count: usize,
        pub visible: bool,
        pub key: String,
    }

    #[async_trait]
    impl Locator for RecordingLocator {
        async fn count(&self) -> anyhow::Result<usize> {
            Ok(self.count)
        }
        async fn is_visible(&self) -> anyhow::Result<bool> {
            Ok(self.visible)
        }
        async fn click(&self) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("click:{}", self.key));
            Ok(())
        }
        async fn dblclick(&self) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("dblclick:{}", self.key));
            Ok(())
        }
        async fn fill(&self, value: &str) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("fill:{}:{value}", self.key));
            Ok(())
        }
        async fn press_key(&self, key: &str) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("press:{}:{key}", self.key));
            Ok(())
        }
        async fn check(&self) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("check:{}", self.key));
            Ok(())
        }
        async fn uncheck(&self) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("uncheck:{}", self.key));
            Ok(())
        }
        async fn select_option(&self, value: &str) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("select:{}:{value}", self.key));
            Ok(())
        }
        async fn scroll_into_view(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn scroll_container_by(&self, _dx: i64, _dy: i64) -> anyhow::Result<()> {
            Ok(())
        }
        async fn container_client_height(&self) -> anyhow::Result<f64> {
            Ok(600.0)
        }
        async fn text_content(&self) -> anyhow::Result<String> {
            Ok(format!("text-of-{}", self.key))
        }
        async fn attribute(&self, name: &str) -> anyhow::Result<Option<String>> {
            Ok(Some(format!("{name}-of-{}", self.key)))
        }
        async fn wait_for(&self, _state: WaitState, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }
        async fn set_input_files(&self, path: &str) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("upload:{}:{path}", self.key));
            Ok(())
        }
        async fn screenshot(&self, _encoding: ImageEncoding) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn by_text(&self, text: &str) -> anyhow::Result<Box<dyn Locator>> {
            self.actions.lock().unwrap().push(format!("by_text:{}:{text}", self.key));
            Ok(Box::new(RecordingLocator {
                actions: self.actions.clone(),
                count: self.count,
                visible: self.visible,
                key: format!("{}>text:{text}", self.key),
            }))
        }
    }

    #[async_trait]
    impl Frame for FakePage {
        async fn wait_body_attached(&self, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }
        fn by_test_id(&self, id: &str) -> Box<dyn Locator> {
            self.make("testId", id)
        }
        fn by_role(&self, role: &str, name: Option<&str>, _exact: Option<bool>) -> Box<dyn Locator> {
            let key = match name {
                Some(n) => format!("{role}:{n}"),
                None => role.to_string(),
            };
            self.make("role", &key)
        }
        fn by_label(&self, text: &str) -> Box<dyn Locator> {
            self.make("label", text)
        }
        fn by_placeholder(&self, text: &str) -> Box<dyn Locator> {
            self.make("placeholder", text)
        }
        fn by_text(&self, text: &str) -> Box<dyn Locator> {
            self.make("text", text)
        }
        fn by_css(&self, css: &str, _has_text: Option<&str>) -> Box<dyn Locator> {
            self.make("css", css)
        }
    }

    impl FakePage {
        fn make(&self, kind: &'static str, key: &str) -> Box<dyn Locator> {
            let (count, visible) = self.elements.get(&(kind, key.to_string())).copied().unwrap_or((1, true));
            Box::new(RecordingLocator { actions: self.actions.clone(), count, visible, key: format!("{kind}:{key}") })
        }
    }

    #[async_trait]
    impl Page for FakePage {
        fn as_frame(&self) -> &dyn Frame {
            self
        }
        async fn goto(&self, url: &str) -> anyhow::Result<()> {
            self.actions.lock().unwrap().push(format!("goto:{url}"));
            Ok(())
        }
        async fn wait_dom_content_loaded(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn wait_network_idle(&self, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }
        async fn go_back(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reload(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn url(&self) -> anyhow::Result<String> {
            Ok("https://example.com/".to_string())
        }
        async fn content(&self) -> anyhow::Result<String> {
            Ok("<html></html>".to_string())
        }
        async fn screenshot(&self, _encoding: ImageEncoding) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn frame_locator(&self, _selector: &str) -> Box<dyn Frame> {
            Box::new(FakePage::default())
        }
        async fn take_console_errors(&self) -> Vec<String> {
            self.console_errors.clone()
        }
        async fn video_path(&self) -> Option<String> {
            None
        }
    }

    /// A `BrowserContext` double recording cookie/route calls, used by
    /// session and mock handler tests.
    #[derive(Default)]
    pub struct FakeBrowserContext {
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BrowserContext for FakeBrowserContext {
        async fn new_page(&self) -> anyhow::Result<Box<dyn Page>> {
            Ok(Box::new(FakePage::default()))
        }
        async fn add_cookies(&self, cookies: &[crate::browser::Cookie]) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("add_cookies:{}", cookies.len()));
            Ok(())
        }
        async fn storage_state(&self) -> anyhow::Result<crate::browser::StorageState> {
            Ok(crate::browser::StorageState::default())
        }
        async fn route(&self, url_pattern: &str, _method: Option<&str>, _response: crate::browser::MockResponse) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("route:{url_pattern}"));
            Ok(())
        }
        async fn start_tracing(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn stop_tracing(&self, _out_path: &std::path::Path) -> anyhow::Result<()> {
            Ok(())
        }
        async fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
