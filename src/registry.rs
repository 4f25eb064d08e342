//! Step registry & handler contract (§4.4).
//!
//! A handler is anything implementing [`StepHandler`]; the compiler enforces
//! that both `execute` and `describe_schema` exist, which is the contract
//! this section of `executors::StepExecutor` in the pre-existing codebase
//! offered by convention rather than by the type system. Registration only
//! needs to check for name collisions.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::artifacts::ArtifactsManager;
use crate::browser::{BrowserContext, Locator, Page};
use crate::error::RunnerError;
use crate::expand::VariableExpander;
use crate::schema::Selector;
use crate::selector::SelectorResolver;

/// Everything a handler needs besides the live page: variable state,
/// selector resolution, artifact I/O, and the owning browser context (for
/// the handful of handlers — storage state, request mocking — that act on
/// the context rather than the page). Built once per scenario run and
/// threaded through every step; `frame` is refreshed from the step's common
/// `frame:` key before each dispatch.
pub struct StepContext<'a> {
    pub expander: &'a mut VariableExpander,
    pub resolver: &'a SelectorResolver,
    pub artifacts: &'a ArtifactsManager,
    pub browser_context: &'a dyn BrowserContext,
    pub step_timeout: Duration,
    pub frame: Option<String>,
}

impl<'a> StepContext<'a> {
    /// Resolves `selector` inside the step's current frame, if any.
    pub async fn resolve(&self, page: &dyn Page, selector: &Selector) -> Result<Box<dyn Locator>, RunnerError> {
        self.resolver.resolve(page, selector, self.frame.as_deref()).await
    }
}

#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Performs the step. `params` is the raw, not-yet-expanded parameter
    /// map from the scenario YAML — handlers expand the fields they use via
    /// `ctx.expander`, since not every field is necessarily a template
    /// (e.g. a literal `timeout_ms` number never needs expansion).
    async fn execute(&self, page: &dyn Page, params: &serde_yaml::Value, ctx: &mut StepContext<'_>) -> anyhow::Result<()>;

    /// A hand-authored JSON Schema fragment describing accepted params.
    /// Consumed by `StepRegistry::validate_params` and by the linter.
    fn describe_schema(&self) -> serde_json::Value;
}

#[derive(Default)]
pub struct StepRegistry {
    handlers: HashMap<String, Box<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        StepRegistry { handlers: HashMap::new() }
    }

    /// Registers `handler` under `kind`. A second registration under the
    /// same name logs a warning and replaces the first — this mirrors how
    /// the old `StepExecutor` chain let a later-registered executor shadow
    /// an earlier `can_handle` match, except here it's explicit instead of
    /// order-dependent.
    pub fn register(&mut self, kind: impl Into<String>, handler: Box<dyn StepHandler>) {
        let kind = kind.into();
        if self.handlers.insert(kind.clone(), handler).is_some() {
            tracing::warn!(kind = %kind, "step kind re-registered, overwriting previous handler");
        }
    }

    pub fn get(&self, kind: &str) -> Option<&dyn StepHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Validates `params` (converted to JSON) against the handler's schema.
    /// Returns a human-readable error per violation; an unknown `kind` is
    /// not this function's concern (the caller already resolved the
    /// handler to call this).
    pub fn validate_params(&self, kind: &str, params: &serde_json::Value) -> Vec<String> {
        let Some(handler) = self.get(kind) else {
            return vec![format!("unknown step kind '{kind}'")];
        };
        let schema = handler.describe_schema();
        let Ok(compiled) = jsonschema::JSONSchema::compile(&schema) else {
            tracing::warn!(kind = %kind, "handler schema failed to compile, skipping validation");
            return Vec::new();
        };
        let result = match compiled.validate(params) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| format!("{e}")).collect(),
        };
        result
    }
}
