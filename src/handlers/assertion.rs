//! Assertion handlers (§4.5). Unlike waits, these fail immediately rather
//! than polling — the preceding `wait_for*` step is expected to have
//! already settled the page into the asserted state.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::{deserialize_params, SelectorOnly};

pub fn register(registry: &mut StepRegistry) {
    registry.register("expect_visible", Box::new(ExpectVisible));
    registry.register("expect_hidden", Box::new(ExpectHidden));
    registry.register("expect_text", Box::new(ExpectText));
    registry.register("expect_url", Box::new(ExpectUrl));
}

struct ExpectVisible;
#[async_trait]
impl StepHandler for ExpectVisible {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        if !locator.is_visible().await? {
            anyhow::bail!("expected element to be visible but it was hidden");
        }
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

struct ExpectHidden;
#[async_trait]
impl StepHandler for ExpectHidden {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        if locator.is_visible().await? {
            anyhow::bail!("expected element to be hidden but it was visible");
        }
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

#[derive(Debug, Deserialize)]
struct ExpectTextParams {
    by: Selector,
    text: String,
}

struct ExpectText;
#[async_trait]
impl StepHandler for ExpectText {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ExpectTextParams = deserialize_params(params)?;
        let expected = ctx.expander.expand(&p.text)?;
        let locator = ctx.resolve(page, &p.by).await?;
        let actual = locator.text_content().await?;
        if !actual.contains(&expected) {
            anyhow::bail!("expected text to contain '{expected}', got '{actual}'");
        }
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "text"]})
    }
}

#[derive(Debug, Deserialize)]
struct ExpectUrlParams {
    pattern: String,
}

struct ExpectUrl;
#[async_trait]
impl StepHandler for ExpectUrl {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ExpectUrlParams = deserialize_params(params)?;
        let pattern = ctx.expander.expand(&p.pattern)?;
        let regex = regex::Regex::new(&pattern).map_err(|e| anyhow::anyhow!("invalid expect_url pattern: {e}"))?;
        let url = page.url().await?;
        if !regex.is_match(&url) {
            anyhow::bail!("url '{url}' does not match pattern '{pattern}'");
        }
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["pattern"]})
    }
}
