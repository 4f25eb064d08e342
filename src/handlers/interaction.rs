//! Interaction & navigation handlers: click, fill, press, check/uncheck,
//! select, scroll, and the two non-`goto` navigation actions (`goto` itself
//! bypasses the registry per §4.6).

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::{deserialize_params, SelectorOnly};

pub fn register(registry: &mut StepRegistry) {
    registry.register("back", Box::new(Back));
    registry.register("reload", Box::new(Reload));
    registry.register("click", Box::new(Click));
    registry.register("dblclick", Box::new(Dblclick));
    registry.register("fill", Box::new(Fill));
    registry.register("press", Box::new(Press));
    registry.register("check", Box::new(Check));
    registry.register("uncheck", Box::new(Uncheck));
    registry.register("select_option", Box::new(SelectOption));
    registry.register("scroll", Box::new(Scroll));
    registry.register("scroll_into_view", Box::new(ScrollIntoView));
}

struct Back;
#[async_trait]
impl StepHandler for Back {
    async fn execute(&self, page: &dyn Page, _params: &serde_yaml::Value, _ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        page.go_back().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
}

struct Reload;
#[async_trait]
impl StepHandler for Reload {
    async fn execute(&self, page: &dyn Page, _params: &serde_yaml::Value, _ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        page.reload().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
}

/// Best-effort scroll-into-view before an action; failure here is not
/// fatal, matching §4.5's "attempts a bounded scroll-into-view" note.
async fn settle(locator: &dyn crate::browser::Locator) {
    if let Err(e) = locator.scroll_into_view().await {
        tracing::debug!(error = %e, "scroll-into-view before action failed, continuing");
    }
}

struct Click;
#[async_trait]
impl StepHandler for Click {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        settle(locator.as_ref()).await;
        locator.click().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"], "properties": {"by": {"type": "object"}}})
    }
}

struct Dblclick;
#[async_trait]
impl StepHandler for Dblclick {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        settle(locator.as_ref()).await;
        locator.dblclick().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"], "properties": {"by": {"type": "object"}}})
    }
}

#[derive(Debug, Deserialize)]
struct FillParams {
    by: Selector,
    value: String,
}

struct Fill;
#[async_trait]
impl StepHandler for Fill {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: FillParams = deserialize_params(params)?;
        let value = ctx.expander.expand(&p.value)?;
        let locator = ctx.resolve(page, &p.by).await?;
        settle(locator.as_ref()).await;
        locator.fill(&value).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "value"], "properties": {"by": {"type": "object"}, "value": {"type": "string"}}})
    }
}

#[derive(Debug, Deserialize)]
struct PressParams {
    by: Selector,
    key: String,
}

struct Press;
#[async_trait]
impl StepHandler for Press {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: PressParams = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        locator.press_key(&p.key).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "key"], "properties": {"by": {"type": "object"}, "key": {"type": "string"}}})
    }
}

struct Check;
#[async_trait]
impl StepHandler for Check {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        ctx.resolve(page, &p.by).await?.check().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

struct Uncheck;
#[async_trait]
impl StepHandler for Uncheck {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        ctx.resolve(page, &p.by).await?.uncheck().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

#[derive(Debug, Deserialize)]
struct SelectOptionParams {
    by: Selector,
    value: String,
}

struct SelectOption;
#[async_trait]
impl StepHandler for SelectOption {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectOptionParams = deserialize_params(params)?;
        ctx.resolve(page, &p.by).await?.select_option(&p.value).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "value"]})
    }
}

#[derive(Debug, Deserialize)]
struct ScrollParams {
    dx: i64,
    dy: i64,
}

struct Scroll;
#[async_trait]
impl StepHandler for Scroll {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, _ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ScrollParams = deserialize_params(params)?;
        // `scroll` has no selector of its own; it scrolls the document body.
        let body = page.by_css("body", None);
        body.scroll_container_by(p.dx, p.dy).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["dx", "dy"], "properties": {"dx": {"type": "integer"}, "dy": {"type": "integer"}}})
    }
}

struct ScrollIntoView;
#[async_trait]
impl StepHandler for ScrollIntoView {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        ctx.resolve(page, &p.by).await?.scroll_into_view().await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}
