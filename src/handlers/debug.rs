//! Debug handlers (§4.5): ad hoc screenshots, log lines, DOM dumps.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::{deserialize_params, SelectorOnly};

pub fn register(registry: &mut StepRegistry) {
    registry.register("screenshot", Box::new(Screenshot));
    registry.register("log", Box::new(Log));
    registry.register("dump_dom", Box::new(DumpDom));
}

#[derive(Debug, Deserialize, Default)]
struct ScreenshotParams {
    #[serde(default)]
    name: Option<String>,
}

struct Screenshot;
#[async_trait]
impl StepHandler for Screenshot {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ScreenshotParams = deserialize_params(params)?;
        let name = p.name.unwrap_or_else(|| "manual".to_string());
        ctx.artifacts.save_screenshot(page, "manual", &name).await?;
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"name": {"type": "string"}}})
    }
}

#[derive(Debug, Deserialize)]
struct LogParams {
    message: String,
}

struct Log;
#[async_trait]
impl StepHandler for Log {
    async fn execute(&self, _page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: LogParams = deserialize_params(params)?;
        let message = ctx.expander.expand(&p.message)?;
        tracing::info!(message = %message, "scenario log");
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["message"]})
    }
}

struct DumpDom;
#[async_trait]
impl StepHandler for DumpDom {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: SelectorOnly = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        let text = locator.text_content().await?;
        tracing::debug!(dom = %text, "dump_dom");
        Ok(())
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::shared_test_support::{FakeBrowserContext, FakePage};
    use crate::schema::HealingMode;
    use crate::selector::SelectorResolver;

    #[tokio::test]
    async fn log_expands_vars_without_touching_the_page() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), [("who".to_string(), "alice".to_string())].into());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut ctx = StepContext { expander: &mut expander, resolver: &resolver, artifacts: &artifacts, browser_context: &browser_context, step_timeout: std::time::Duration::from_secs(1), frame: None };

        let params: serde_yaml::Value = serde_yaml::from_str(r#"message: "hello ${vars.who}""#).unwrap();
        Log.execute(&page, &params, &mut ctx).await.unwrap();
        assert!(page.actions.lock().unwrap().is_empty());
    }
}
