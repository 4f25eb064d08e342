//! Artifacts manager (§4.7).
//!
//! Grounded on the original `ArtifactsManager`: one run directory per
//! scenario execution, screenshot naming with a monotonic counter, a
//! round-tripped YAML flow copy, a secret-masked environment manifest, and
//! on-success cleanup of `on_failure`-mode trace/video directories.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::browser::{BrowserContext, ImageEncoding, Page};
use crate::schema::{ArtifactMode, Scenario, ScreenshotMode};

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]").unwrap());
static REPEATED_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

pub fn sanitize_step_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "-");
    let collapsed = REPEATED_DASH.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}

/// Collects every value that must be masked in user-visible text: the
/// `value` field of any `fill` step entry carrying `secret: true`.
pub fn collect_secret_values(scenario: &Scenario) -> Vec<String> {
    let mut out = Vec::new();
    collect_from_steps(&scenario.steps, &mut out);
    out
}

fn collect_from_steps(steps: &[crate::schema::StepEntry], out: &mut Vec<String>) {
    use crate::schema::StepEntry;
    for step in steps {
        match step {
            StepEntry::Section { steps, .. } => collect_from_steps(steps, out),
            StepEntry::Step { kind, secret, params, .. } => {
                if kind == "fill" && secret.unwrap_or(false) {
                    if let Some(value) = params.get("value").and_then(|v| v.as_str()) {
                        if !value.is_empty() {
                            out.push(value.to_string());
                        }
                    }
                }
            }
        }
    }
}

/// Replaces every occurrence of a secret value with `***`.
pub fn mask_secrets(scenario: &Scenario, text: &str) -> String {
    let mut result = text.to_string();
    for secret in collect_secret_values(scenario) {
        result = result.replace(&secret, "***");
    }
    result
}

#[derive(Debug, Serialize)]
struct EnvManifest {
    title: String,
    base_url: String,
    vars: std::collections::BTreeMap<String, String>,
    healing: crate::schema::HealingMode,
    runtime_version: String,
    platform: String,
    timestamp: String,
}

pub struct ArtifactsManager {
    config: crate::schema::ArtifactsConfig,
    base_dir: PathBuf,
    run_dir: PathBuf,
    screenshot_counter: AtomicU32,
}

impl ArtifactsManager {
    /// Creates the run directory (and its `screenshots/`, `trace/`,
    /// `video/`, `logs/` subdirectories) eagerly.
    pub fn create_run_dir(base_dir: impl Into<PathBuf>, config: crate::schema::ArtifactsConfig, timestamp: chrono::DateTime<chrono::Utc>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        let dir_name = format!("run-{}", timestamp.format("%Y%m%d-%H%M%S"));
        let run_dir = base_dir.join(dir_name);
        for subdir in ["screenshots", "trace", "video", "logs"] {
            std::fs::create_dir_all(run_dir.join(subdir))?;
        }
        Ok(ArtifactsManager { config, base_dir, run_dir, screenshot_counter: AtomicU32::new(0) })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn next_index(&self) -> u32 {
        self.screenshot_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Saves a screenshot named `NNNN_<phase>-<sanitized-name>.<ext>`, where
    /// `phase` is `before` or `after`. Returns `None` when the configured
    /// mode is `none`. The failure path has its own distinct naming and
    /// format — see [`Self::save_error_screenshot`].
    pub async fn save_screenshot(&self, page: &dyn Page, phase: &str, step_name: &str) -> anyhow::Result<Option<PathBuf>> {
        if self.config.screenshots.mode == ScreenshotMode::None {
            return Ok(None);
        }
        let index = self.next_index();
        let sanitized = sanitize_step_name(step_name);
        let ext = self.config.screenshots.format.extension();
        let filename = format!("{index:04}_{phase}-{sanitized}.{ext}");
        let path = self.run_dir.join("screenshots").join(&filename);
        self.capture_screenshot(page, &path).await
    }

    /// Saves a best-effort screenshot on step failure, named
    /// `stepNNN_<sanitized-name>_error.png` — always PNG regardless of the
    /// configured screenshot format, per the on-failure artifact contract.
    /// Returns `None` when the configured mode is `none`.
    pub async fn save_error_screenshot(&self, page: &dyn Page, step_name: &str) -> anyhow::Result<Option<PathBuf>> {
        if self.config.screenshots.mode == ScreenshotMode::None {
            return Ok(None);
        }
        let index = self.next_index();
        let sanitized = sanitize_step_name(step_name);
        let filename = format!("step{index:03}_{sanitized}_error.png");
        let path = self.run_dir.join("screenshots").join(&filename);
        let bytes = page.screenshot(ImageEncoding::Png).await?;
        std::fs::write(&path, &bytes)?;
        tracing::info!(path = %path.display(), "saved error screenshot");
        Ok(Some(path))
    }

    async fn capture_screenshot(&self, page: &dyn Page, path: &Path) -> anyhow::Result<Option<PathBuf>> {
        let encoding = match self.config.screenshots.format {
            crate::schema::ImageFormat::Jpeg => ImageEncoding::Jpeg { quality: self.config.screenshots.quality },
            crate::schema::ImageFormat::Png => ImageEncoding::Png,
        };
        let bytes = page.screenshot(encoding).await?;
        std::fs::write(path, bytes)?;
        tracing::info!(path = %path.display(), "saved screenshot");
        Ok(Some(path.to_path_buf()))
    }

    pub async fn save_trace(&self, context: &dyn BrowserContext) -> anyhow::Result<Option<PathBuf>> {
        if self.config.trace.mode == ArtifactMode::None {
            return Ok(None);
        }
        let path = self.run_dir.join("trace").join("trace.zip");
        context.stop_tracing(&path).await?;
        Ok(Some(path))
    }

    pub async fn save_video(&self, page: &dyn Page) -> anyhow::Result<Option<PathBuf>> {
        if self.config.video.mode == ArtifactMode::None {
            return Ok(None);
        }
        let Some(source) = page.video_path().await else {
            tracing::warn!("video recording was enabled but no recording path was reported");
            return Ok(None);
        };
        let source = PathBuf::from(source);
        let Some(file_name) = source.file_name() else { return Ok(None) };
        let dest = self.run_dir.join("video").join(file_name);
        std::fs::copy(&source, &dest)?;
        Ok(Some(dest))
    }

    pub fn save_flow_copy(&self, scenario: &Scenario) -> anyhow::Result<PathBuf> {
        let path = self.run_dir.join("flow.yaml");
        let bytes = crate::schema::dump(scenario)?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn save_env_info(&self, scenario: &Scenario, timestamp: chrono::DateTime<chrono::Utc>) -> anyhow::Result<PathBuf> {
        let secrets = collect_secret_values(scenario);
        let vars = scenario
            .vars
            .iter()
            .map(|(k, v)| {
                let masked = if secrets.contains(v) { "***".to_string() } else { v.clone() };
                (k.clone(), masked)
            })
            .collect();

        let manifest = EnvManifest {
            title: scenario.title.clone(),
            base_url: scenario.base_url.clone(),
            vars,
            healing: scenario.healing,
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            timestamp: timestamp.to_rfc3339(),
        };

        let path = self.run_dir.join("env.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
        Ok(path)
    }

    /// Removes `on_failure`-mode artifact directories after a successful
    /// run. `always` mode is untouched; screenshots are never cleaned.
    pub fn cleanup_on_success(&self) -> std::io::Result<()> {
        if self.config.trace.mode == ArtifactMode::OnFailure {
            let dir = self.run_dir.join("trace");
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        if self.config.video.mode == ArtifactMode::OnFailure {
            let dir = self.run_dir.join("video");
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }
}
