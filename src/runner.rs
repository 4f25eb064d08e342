//! Runner orchestrator (§4.6): the per-scenario lifecycle and per-step
//! execution sequence, plus bounded-concurrency execution of many
//! scenarios. The concurrency shape is grounded on the pre-existing
//! `planner::DagPlanner`'s `Semaphore`-bounded task pool, simplified here
//! since scenarios (unlike DAG steps) never depend on one another.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::artifacts::{mask_secrets, ArtifactsManager};
use crate::browser::{BrowserContext, BrowserControl, LaunchOptions, Page};
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::expand::VariableExpander;
use crate::registry::{StepContext, StepRegistry};
use crate::report::{ScenarioReport, StepOutcome, StepStatus};
use crate::schema::{ArtifactMode, Scenario, ScreenshotMode, StepEntry};
use crate::selector::SelectorResolver;

pub struct Runner<'a> {
    browser: &'a dyn BrowserControl,
    registry: &'a StepRegistry,
    config: &'a RunnerConfig,
}

impl<'a> Runner<'a> {
    pub fn new(browser: &'a dyn BrowserControl, registry: &'a StepRegistry, config: &'a RunnerConfig) -> Self {
        Runner { browser, registry, config }
    }

    /// Runs one scenario end to end and writes its JSON/HTML/JUnit reports
    /// into its own artifact run directory.
    pub async fn run(&self, scenario: &Scenario) -> anyhow::Result<ScenarioReport> {
        let started_at = chrono::Utc::now();
        let artifacts = ArtifactsManager::create_run_dir(&self.config.base_artifacts_dir, scenario.artifacts.clone(), started_at)?;
        artifacts.save_flow_copy(scenario)?;
        artifacts.save_env_info(scenario, started_at)?;

        let launch_options = LaunchOptions {
            headed: self.config.headed,
            slow_mo: Duration::from_millis(self.config.slow_mo_ms),
            viewport: None,
            timezone: None,
            locale: None,
            extra_headers: Vec::new(),
            storage_state_path: None,
            record_video_dir: None,
        };
        let context = self.browser.launch(launch_options).await?;
        if scenario.artifacts.trace.mode != ArtifactMode::None {
            context.start_tracing().await?;
        }

        let page = context.new_page().await?;
        if !matches!(scenario.steps.first(), Some(StepEntry::Step { kind, .. }) if kind == "goto") {
            page.goto(&scenario.base_url).await?;
            page.wait_dom_content_loaded().await?;
        }

        let vars: Vec<(String, String)> = scenario.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let mut expander = VariableExpander::new(vars);
        let resolver = SelectorResolver::new(scenario.healing);
        let step_timeout = Duration::from_millis(self.config.step_timeout_ms);

        let mut outcomes = Vec::new();
        {
            let mut ctx = StepContext {
                expander: &mut expander,
                resolver: &resolver,
                artifacts: &artifacts,
                browser_context: context.as_ref(),
                step_timeout,
                frame: None,
            };
            let mut counter = 0usize;
            let mut aborted = false;
            self.run_steps(&scenario.steps, page.as_ref(), &mut ctx, scenario, &mut outcomes, &mut counter, &mut aborted, None).await;
        }

        artifacts.save_trace(context.as_ref()).await.ok();
        artifacts.save_video(page.as_ref()).await.ok();
        context.close().await?;

        let finished_at = chrono::Utc::now();
        let report = ScenarioReport::new(scenario.title.clone(), started_at.to_rfc3339(), finished_at.to_rfc3339(), outcomes);
        if report.status == StepStatus::Passed {
            artifacts.cleanup_on_success()?;
        }
        report.write_json(artifacts.run_dir())?;
        report.write_html(artifacts.run_dir())?;
        report.write_junit(artifacts.run_dir())?;
        Ok(report)
    }

    /// Schedules up to `config.workers` scenarios concurrently. Each gets
    /// its own browser, context, page, and artifacts directory — there is
    /// no shared mutable state between scenarios.
    pub async fn run_parallel(&self, scenarios: &[Scenario]) -> Vec<anyhow::Result<ScenarioReport>> {
        let semaphore = Semaphore::new(self.config.workers.max(1));
        let futures = scenarios.iter().map(|scenario| async {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            self.run(scenario).await
        });
        futures::future::join_all(futures).await
    }

    fn run_steps<'f>(
        &'f self,
        steps: &'f [StepEntry],
        page: &'f dyn Page,
        ctx: &'f mut StepContext<'_>,
        scenario: &'f Scenario,
        outcomes: &'f mut Vec<StepOutcome>,
        counter: &'f mut usize,
        aborted: &'f mut bool,
        section: Option<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'f>> {
        Box::pin(async move {
            for step in steps {
                if *aborted {
                    break;
                }
                match step {
                    StepEntry::Section { name, steps } => {
                        tracing::info!(section = %name, "section start");
                        self.run_steps(steps, page, ctx, scenario, outcomes, counter, aborted, Some(name.clone())).await;
                    }
                    StepEntry::Step { kind, frame, params, .. } => {
                        let step_name = step.name_or_synthesized(*counter);
                        let index = *counter;
                        *counter += 1;
                        let ok = self
                            .run_single_step(kind, &step_name, index, section.clone(), frame.clone(), params, page, ctx, scenario, outcomes)
                            .await;
                        if !ok {
                            *aborted = true;
                        }
                    }
                }
            }
        })
    }

    /// Executes one leaf step: pre-screenshot, `before_each_step` hooks,
    /// timeout-bounded dispatch, `after_each_step` hooks, post-screenshot.
    /// Returns `false` when the step failed, signalling the caller to abort
    /// the scenario.
    async fn run_single_step(
        &self,
        kind: &str,
        step_name: &str,
        index: usize,
        section: Option<String>,
        frame: Option<String>,
        params: &serde_yaml::Value,
        page: &dyn Page,
        ctx: &mut StepContext<'_>,
        scenario: &Scenario,
        outcomes: &mut Vec<StepOutcome>,
    ) -> bool {
        let start = Instant::now();
        let screenshot_mode = scenario.artifacts.screenshots.mode;
        let run_dir = ctx.artifacts.run_dir().to_path_buf();

        let mut before_screenshot = None;
        if matches!(screenshot_mode, ScreenshotMode::BeforeEachStep | ScreenshotMode::BeforeAndAfter) {
            before_screenshot = ctx.artifacts.save_screenshot(page, "before", step_name).await.ok().flatten();
        }

        let result = self.run_dispatch_with_hooks(kind, step_name, frame, params, page, ctx, scenario).await;
        ctx.frame = None;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                let mut screenshot = before_screenshot;
                if matches!(screenshot_mode, ScreenshotMode::BeforeAndAfter) {
                    if let Ok(Some(path)) = ctx.artifacts.save_screenshot(page, "after", step_name).await {
                        screenshot = Some(path);
                    }
                }
                outcomes.push(StepOutcome {
                    step_name: step_name.to_string(),
                    kind: kind.to_string(),
                    index,
                    status: StepStatus::Passed,
                    duration_ms,
                    error: None,
                    screenshot: screenshot.map(|p| relativize(&run_dir, p)),
                    section: section.clone(),
                });
                true
            }
            Err(e) => {
                let error_screenshot = ctx.artifacts.save_error_screenshot(page, step_name).await.ok().flatten();
                let message = mask_secrets(scenario, &e.to_string());
                outcomes.push(StepOutcome {
                    step_name: step_name.to_string(),
                    kind: kind.to_string(),
                    index,
                    status: StepStatus::Failed,
                    duration_ms,
                    error: Some(message),
                    screenshot: error_screenshot.or(before_screenshot).map(|p| relativize(&run_dir, p)),
                    section,
                });
                false
            }
        }
    }

    async fn run_dispatch_with_hooks(
        &self,
        kind: &str,
        step_name: &str,
        frame: Option<String>,
        params: &serde_yaml::Value,
        page: &dyn Page,
        ctx: &mut StepContext<'_>,
        scenario: &Scenario,
    ) -> anyhow::Result<()> {
        ctx.frame = None;
        self.run_hook_entries(&scenario.hooks.before_each_step, page, ctx).await?;

        ctx.frame = frame;
        let step_timeout = ctx.step_timeout;
        let dispatch = self.dispatch(kind, params, page, ctx);
        if step_timeout > Duration::ZERO {
            match tokio::time::timeout(step_timeout, dispatch).await {
                Ok(inner) => inner?,
                Err(_) => {
                    return Err(RunnerError::StepTimeout {
                        step_name: step_name.to_string(),
                        budget_ms: step_timeout.as_millis() as u64,
                    }
                    .into())
                }
            }
        } else {
            dispatch.await?;
        }

        ctx.frame = None;
        self.run_hook_entries(&scenario.hooks.after_each_step, page, ctx).await
    }

    /// `goto` bypasses the registry per §4.6 — it navigates directly and
    /// waits for DOM-content-loaded, rather than going through a handler.
    async fn dispatch(&self, kind: &str, params: &serde_yaml::Value, page: &dyn Page, ctx: &mut StepContext<'_>) -> anyhow::Result<()> {
        if kind == "goto" {
            let url = params.get("url").and_then(|v| v.as_str()).ok_or_else(|| anyhow::anyhow!("goto requires a 'url' param"))?;
            let url = ctx.expander.expand(url)?;
            page.goto(&url).await?;
            page.wait_dom_content_loaded().await?;
            return Ok(());
        }
        let handler = self
            .registry
            .get(kind)
            .ok_or_else(|| anyhow::Error::new(RunnerError::UnknownStepKind(kind.to_string())))?;
        handler.execute(page, params, ctx).await
    }

    /// Runs hook entries through the same dispatch path as an ordinary
    /// step, without triggering nested `before_each_step`/`after_each_step`
    /// hooks or per-step screenshots.
    fn run_hook_entries<'f>(
        &'f self,
        entries: &'f [StepEntry],
        page: &'f dyn Page,
        ctx: &'f mut StepContext<'_>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'f>> {
        Box::pin(async move {
            for entry in entries {
                match entry {
                    StepEntry::Section { steps, .. } => self.run_hook_entries(steps, page, ctx).await?,
                    StepEntry::Step { kind, params, .. } => self.dispatch(kind, params, page, ctx).await?,
                }
            }
            Ok(())
        })
    }
}

fn relativize(run_dir: &Path, path: PathBuf) -> String {
    path.strip_prefix(run_dir).unwrap_or(&path).to_string_lossy().into_owned()
}
