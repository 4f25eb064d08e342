//! Runner configuration, read from the environment with CLI overrides.
//!
//! Follows the same `env::var` + parse-and-default pattern the rest of this
//! codebase uses for its execution limits: every field has a documented
//! default and an env var that overrides it, logged once at startup.

use std::env;

pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SLOW_MO_MS: u64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Launch the browser with a visible window instead of headless.
    pub headed: bool,
    /// Maximum number of scenarios run concurrently by `run_parallel`.
    pub workers: usize,
    /// Base directory under which each run gets its own timestamped folder.
    pub base_artifacts_dir: String,
    /// Artificial delay (ms) injected between browser-control operations.
    pub slow_mo_ms: u64,
    /// Per-step wall-clock budget in milliseconds; `0` disables the timeout.
    pub step_timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            headed: false,
            workers: DEFAULT_WORKERS,
            base_artifacts_dir: "artifacts".to_string(),
            slow_mo_ms: DEFAULT_SLOW_MO_MS,
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }
}

impl RunnerConfig {
    /// Builds a config from the environment, falling back to defaults for
    /// anything absent or unparseable.
    pub fn from_env() -> Self {
        let defaults = RunnerConfig::default();
        RunnerConfig {
            headed: env_bool("SCENARIO_RUNNER_HEADED", defaults.headed),
            workers: env_parse("SCENARIO_RUNNER_WORKERS", defaults.workers),
            base_artifacts_dir: env::var("SCENARIO_RUNNER_ARTIFACTS_DIR")
                .unwrap_or(defaults.base_artifacts_dir),
            slow_mo_ms: env_parse("SCENARIO_RUNNER_SLOW_MO_MS", defaults.slow_mo_ms),
            step_timeout_ms: env_parse("SCENARIO_RUNNER_STEP_TIMEOUT_MS", defaults.step_timeout_ms),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        assert_eq!(cfg.step_timeout_ms, DEFAULT_STEP_TIMEOUT_MS);
        assert!(!cfg.headed);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("SCENARIO_RUNNER_TEST_KEY", "not-a-number");
        let value: usize = env_parse("SCENARIO_RUNNER_TEST_KEY", 7);
        assert_eq!(value, 7);
        std::env::remove_var("SCENARIO_RUNNER_TEST_KEY");
    }
}
