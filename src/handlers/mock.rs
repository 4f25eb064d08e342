//! Mock / stub handlers (§4.5): request interception on the browser context.

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{MockResponse, Page};
use crate::registry::{StepContext, StepHandler, StepRegistry};

use super::deserialize_params;

pub fn register(registry: &mut StepRegistry) {
    registry.register("api_mock", Box::new(ApiMock));
    registry.register("route_stub", Box::new(RouteStub));
}

#[derive(Debug, Deserialize)]
struct ResponseSpec {
    status: u16,
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiMockParams {
    url_pattern: String,
    #[serde(default)]
    method: Option<String>,
    response: ResponseSpec,
}

struct ApiMock;
#[async_trait]
impl StepHandler for ApiMock {
    async fn execute(&self, _page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: ApiMockParams = deserialize_params(params)?;
        let url_pattern = ctx.expander.expand(&p.url_pattern)?;
        ctx.browser_context
            .route(&url_pattern, p.method.as_deref(), MockResponse { status: p.response.status, body: p.response.body })
            .await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["url_pattern", "response"],
            "properties": {
                "url_pattern": {"type": "string"},
                "method": {"type": "string"},
                "response": {
                    "type": "object",
                    "required": ["status"],
                    "properties": {"status": {"type": "integer"}, "body": {}}
                }
            }
        })
    }
}

/// A lightweight stub used when a scenario only needs *some* response, not a
/// specific payload — `handler_id` is recorded in the log line but otherwise
/// unused; the intercept always answers 200 with an empty JSON object.
#[derive(Debug, Deserialize)]
struct RouteStubParams {
    url_pattern: String,
    handler_id: String,
}

struct RouteStub;
#[async_trait]
impl StepHandler for RouteStub {
    async fn execute(&self, _page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        let p: RouteStubParams = deserialize_params(params)?;
        let url_pattern = ctx.expander.expand(&p.url_pattern)?;
        tracing::debug!(handler_id = %p.handler_id, url_pattern = %url_pattern, "installing route stub");
        ctx.browser_context
            .route(&url_pattern, None, MockResponse { status: 200, body: serde_json::json!({}) })
            .await
    }
    fn describe_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "required": ["url_pattern", "handler_id"]})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::shared_test_support::{FakeBrowserContext, FakePage};
    use crate::schema::HealingMode;
    use crate::selector::SelectorResolver;

    fn ctx<'a>(
        expander: &'a mut crate::expand::VariableExpander,
        resolver: &'a SelectorResolver,
        artifacts: &'a crate::artifacts::ArtifactsManager,
        browser_context: &'a FakeBrowserContext,
    ) -> StepContext<'a> {
        StepContext { expander, resolver, artifacts, browser_context, step_timeout: std::time::Duration::from_secs(1), frame: None }
    }

    #[tokio::test]
    async fn api_mock_installs_a_route_with_expanded_pattern() {
        let page = FakePage::default();
        let mut expander = crate::expand::VariableExpander::with_env(Default::default(), [("id".to_string(), "42".to_string())].into());
        let resolver = SelectorResolver::new(HealingMode::Off);
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = crate::artifacts::ArtifactsManager::create_run_dir(tmp.path(), crate::schema::ArtifactsConfig::default(), chrono::Utc::now()).unwrap();
        let browser_context = FakeBrowserContext::default();
        let mut c = ctx(&mut expander, &resolver, &artifacts, &browser_context);

        let params: serde_yaml::Value = serde_yaml::from_str(
            r#"url_pattern: "/api/orders/${vars.id}"
response: { status: 200, body: { ok: true } }"#,
        )
        .unwrap();
        ApiMock.execute(&page, &params, &mut c).await.unwrap();
        assert!(browser_context.calls.lock().unwrap().iter().any(|c| c == "route:/api/orders/42"));
    }
}
