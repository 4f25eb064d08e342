//! Waiting handlers (§4.5).

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::Page;
use crate::registry::{StepContext, StepHandler, StepRegistry};
use crate::schema::Selector;

use super::{deserialize_params, parse_wait_state, timeout_or, DEFAULT_WAIT_TIMEOUT};

pub fn register(registry: &mut StepRegistry) {
    registry.register("wait_for", Box::new(WaitFor));
    registry.register("wait_for_visible", Box::new(WaitForVisible));
    registry.register("wait_for_hidden", Box::new(WaitForHidden));
    registry.register("wait_for_network_idle", Box::new(WaitForNetworkIdle));
}

#[derive(Debug, Deserialize)]
struct WaitForParams {
    by: Selector,
    state: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

struct WaitFor;
#[async_trait]
impl StepHandler for WaitFor {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: WaitForParams = deserialize_params(params)?;
        let state = parse_wait_state(&p.state)?;
        let locator = ctx.resolve(page, &p.by).await?;
        locator.wait_for(state, timeout_or(p.timeout_ms, DEFAULT_WAIT_TIMEOUT)).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["by", "state"],
            "properties": {
                "by": {"type": "object"},
                "state": {"enum": ["visible", "hidden", "attached", "detached"]},
                "timeout_ms": {"type": "integer"}
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct WaitForVisibilityParams {
    by: Selector,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

struct WaitForVisible;
#[async_trait]
impl StepHandler for WaitForVisible {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: WaitForVisibilityParams = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        locator.wait_for(crate::browser::WaitState::Visible, timeout_or(p.timeout_ms, DEFAULT_WAIT_TIMEOUT)).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

struct WaitForHidden;
#[async_trait]
impl StepHandler for WaitForHidden {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: WaitForVisibilityParams = deserialize_params(params)?;
        let locator = ctx.resolve(page, &p.by).await?;
        locator.wait_for(crate::browser::WaitState::Hidden, timeout_or(p.timeout_ms, DEFAULT_WAIT_TIMEOUT)).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["by"]})
    }
}

#[derive(Debug, Deserialize)]
struct NetworkIdleParams {
    #[serde(default)]
    timeout_ms: Option<u64>,
}

struct WaitForNetworkIdle;
#[async_trait]
impl StepHandler for WaitForNetworkIdle {
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, _ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: NetworkIdleParams = deserialize_params(params)?;
        page.wait_network_idle(timeout_or(p.timeout_ms, DEFAULT_WAIT_TIMEOUT)).await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"timeout_ms": {"type": "integer"}}})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::shared_test_support::{FakeBrowserContext, FakePage};
    use crate::schema::HealingMode;
    use crate::selector::SelectorResolver;

    #[tokio::test]
    async fn wait_for_rejects_unknown_state() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), Default::default());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut ctx = StepContext { expander: &mut expander, resolver: &resolver, artifacts: &artifacts, browser_context: &browser_context, step_timeout: std::time::Duration::from_secs(1), frame: None };

        let params: serde_yaml::Value = serde_yaml::from_str(r#"by: { testId: "x" }
state: "sideways""#).unwrap();
        let err = WaitFor.execute(&page, &params, &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("unknown wait state"));
    }
}
