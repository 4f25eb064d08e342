//! Session handlers (§4.5): storage-state snapshotting and restore.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};

use super::deserialize_params;

pub fn register(registry: &mut StepRegistry) {
    registry.register("use_storage_state", Box::new(UseStorageState));
    registry.register("save_storage_state", Box::new(SaveStorageState));
}

#[derive(Debug, Deserialize)]
struct PathParams {
    path: String,
}

struct UseStorageState;
#[async_trait]
impl StepHandler for UseStorageState {
    async fn execute(&self, _page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: PathParams = deserialize_params(params)?;
        let path = ctx.expander.expand(&p.path)?;
        let raw = std::fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("reading storage state '{path}': {e}"))?;
        let state: crate::browser::StorageState =
            serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing storage state '{path}': {e}"))?;
        ctx.browser_context.add_cookies(&state.cookies).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["path"], "properties": {"path": {"type": "string"}}})
    }
}

struct SaveStorageState;
#[async_trait]
impl StepHandler for SaveStorageState {
    async fn execute(&self, _page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: PathParams = deserialize_params(params)?;
        let path = ctx.expander.expand(&p.path)?;
        let state = ctx.browser_context.storage_state().await?;
        if let Some(parent) = Path::new(&path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(&path, json).map_err(|e| anyhow::anyhow!("writing storage state '{path}': {e}"))?;
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["path"], "properties": {"path": {"type": "string"}}})
    }
}
