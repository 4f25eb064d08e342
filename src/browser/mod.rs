//! Browser-control port (§4.11, ambient).
//!
//! `spec.md` describes the resolver, handlers, and runner only in terms of
//! "the live page object provided by the browser-control library" — it
//! never names a concrete crate. This module is that boundary: a small set
//! of async traits every other module programs against, with exactly one
//! adapter (`fantoccini_adapter`) linking a real WebDriver client. Nothing
//! outside this module imports `fantoccini` directly, the same way the rest
//! of this codebase keeps its HTTP client behind a single executor module.

pub mod fantoccini_adapter;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy)]
pub enum ImageEncoding {
    Jpeg { quality: u8 },
    Png,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// A live handle to zero or more page elements. The resolver never acts on
/// a locator — it only ever hands one back to a step handler.
#[async_trait]
pub trait Locator: Send + Sync + std::fmt::Debug {
    async fn count(&self) -> Result<usize>;
    async fn is_visible(&self) -> Result<bool>;
    async fn click(&self) -> Result<()>;
    async fn dblclick(&self) -> Result<()>;
    async fn fill(&self, value: &str) -> Result<()>;
    async fn press_key(&self, key: &str) -> Result<()>;
    async fn check(&self) -> Result<()>;
    async fn uncheck(&self) -> Result<()>;
    async fn select_option(&self, value: &str) -> Result<()>;
    async fn scroll_into_view(&self) -> Result<()>;
    async fn scroll_container_by(&self, dx: i64, dy: i64) -> Result<()>;
    async fn container_client_height(&self) -> Result<f64>;
    async fn text_content(&self) -> Result<String>;
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    async fn wait_for(&self, state: WaitState, timeout: Duration) -> Result<()>;
    async fn set_input_files(&self, path: &str) -> Result<()>;
    async fn screenshot(&self, encoding: ImageEncoding) -> Result<Vec<u8>>;
    /// Scopes a text search to this element's own descendants, rather than
    /// the whole page — used by composite handlers to pick a unique option
    /// out of a dropdown/list they just opened, without risking a match on
    /// unrelated text elsewhere on the page.
    async fn by_text(&self, text: &str) -> Result<Box<dyn Locator>>;
}

/// The frame-scoped lookup capability shared by pages and iframes.
#[async_trait]
pub trait Frame: Send + Sync {
    async fn wait_body_attached(&self, timeout: Duration) -> Result<()>;
    fn by_test_id(&self, id: &str) -> Box<dyn Locator>;
    fn by_role(&self, role: &str, name: Option<&str>, exact: Option<bool>) -> Box<dyn Locator>;
    fn by_label(&self, text: &str) -> Box<dyn Locator>;
    fn by_placeholder(&self, text: &str) -> Box<dyn Locator>;
    fn by_text(&self, text: &str) -> Box<dyn Locator>;
    fn by_css(&self, css: &str, has_text: Option<&str>) -> Box<dyn Locator>;
}

#[async_trait]
pub trait Page: Frame + Send + Sync {
    /// Returns `self` as a `&dyn Frame`. Trait-object upcasting isn't relied
    /// on elsewhere in this codebase, so every implementor provides this as
    /// a one-line `self` coercion.
    fn as_frame(&self) -> &dyn Frame;
    async fn goto(&self, url: &str) -> Result<()>;
    async fn wait_dom_content_loaded(&self) -> Result<()>;
    async fn wait_network_idle(&self, timeout: Duration) -> Result<()>;
    async fn go_back(&self) -> Result<()>;
    async fn reload(&self) -> Result<()>;
    async fn url(&self) -> Result<String>;
    async fn content(&self) -> Result<String>;
    async fn screenshot(&self, encoding: ImageEncoding) -> Result<Vec<u8>>;
    async fn frame_locator(&self, selector: &str) -> Box<dyn Frame>;
    /// Drains and returns every console error observed since the last call.
    async fn take_console_errors(&self) -> Vec<String>;
    /// Path to the in-progress video recording, if one was configured.
    async fn video_path(&self) -> Option<String>;
}

#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>>;
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()>;
    async fn storage_state(&self) -> Result<StorageState>;
    async fn route(&self, url_pattern: &str, method: Option<&str>, response: MockResponse) -> Result<()>;
    async fn start_tracing(&self) -> Result<()>;
    async fn stop_tracing(&self, out_path: &Path) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headed: bool,
    pub slow_mo: Duration,
    pub viewport: Option<(u32, u32)>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub storage_state_path: Option<String>,
    pub record_video_dir: Option<String>,
}

#[async_trait]
pub trait BrowserControl: Send + Sync {
    async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn BrowserContext>>;
}
