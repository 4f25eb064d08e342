//! Capture handlers (§4.5): pull DOM state into scenario variables.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::deserialize_params;

pub fn register(registry: &mut StepRegistry) {
    registry.register("store_text", Box::new(StoreText));
    registry.register("store_attr", Box::new(StoreAttr));
}

#[derive(Debug, Deserialize)]
struct StoreTextParams {
    by: Selector,
    var_name: String,
}

struct StoreText;
#[async_trait]
impl StepHandler for StoreText {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: StoreTextParams = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        let text = locator.text_content().await?;
        ctx.expander.set_var(p.var_name, text);
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "var_name"]})
    }
}

#[derive(Debug, Deserialize)]
struct StoreAttrParams {
    by: Selector,
    attr: String,
    var_name: String,
}

struct StoreAttr;
#[async_trait]
impl StepHandler for StoreAttr {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: StoreAttrParams = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        let value = locator.attribute(&p.attr).await?.unwrap_or_default();
        ctx.expander.set_var(p.var_name, value);
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by", "attr", "var_name"]})
    }
}
