//! Authoring interfaces (§4.10) — a boundary only, no concrete LLM client.
//!
//! Grounded on `AiDrafter`/`AiRefiner`/`ai/explain.py`: an injectable
//! completion port with one method, three free functions that parse/
//! validate around it, and a deterministic stub implementation for tests.

use crate::error::{Result, RunnerError};
use crate::schema::{self, Scenario};

/// A text-completion port. No concrete implementation lives in this crate;
/// callers inject one (an HTTP-backed LLM client, a stub, a recorded
/// fixture) from outside.
pub trait CompletionPort: Send + Sync {
    fn generate(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

/// Returns the minimal valid scenario, used by tests and as a
/// documentation example of what a drafted scenario looks like.
pub struct StubCompletionPort {
    pub response: String,
}

impl Default for StubCompletionPort {
    fn default() -> Self {
        StubCompletionPort {
            response: concat!(
                "title: sample scenario\n",
                "base_url: http://localhost:3000\n",
                "vars: {}\n",
                "steps:\n",
                "  - goto: http://localhost:3000/\n",
            )
            .to_string(),
        }
    }
}

impl CompletionPort for StubCompletionPort {
    fn generate(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

const DRAFT_SYSTEM_PROMPT: &str = "You write scenario YAML for a browser-automation test runner. Respond with YAML only.";
const REFINE_SYSTEM_PROMPT: &str = "You improve existing scenario YAML for a browser-automation test runner without removing secret: true flags. Respond with YAML only.";

/// Generates a scenario from a natural-language spec.
pub fn draft(port: &dyn CompletionPort, spec_text: &str) -> Result<Scenario> {
    let user_prompt = format!("Specification:\n{spec_text}\n\nProduce a complete scenario YAML document.");
    let raw = port.generate(DRAFT_SYSTEM_PROMPT, &user_prompt).map_err(|e| RunnerError::Artifact(format!("draft completion failed: {e}")))?;
    schema::load(raw.as_bytes()).map_err(RunnerError::Validation)
}

/// Asks the port to improve a scenario, then enforces that no `secret: true`
/// flag was dropped in the process.
pub fn refine(port: &dyn CompletionPort, scenario: &Scenario) -> Result<Scenario> {
    let before = count_secrets(scenario);
    let current_yaml = schema::dump(scenario).map_err(|e| RunnerError::Artifact(e.to_string()))?;
    let current_yaml = String::from_utf8_lossy(&current_yaml);

    let user_prompt = format!("Current scenario:\n{current_yaml}\n\nImprove selector robustness and step naming without changing behavior.");
    let raw = port.generate(REFINE_SYSTEM_PROMPT, &user_prompt).map_err(|e| RunnerError::Artifact(format!("refine completion failed: {e}")))?;

    let refined = schema::load(raw.as_bytes()).map_err(RunnerError::Validation)?;
    let after = count_secrets(&refined);
    if after < before {
        return Err(RunnerError::SecretLost { before, after });
    }
    Ok(refined)
}

/// Produces a short human-readable description of what a scenario does.
pub fn explain(port: &dyn CompletionPort, scenario: &Scenario) -> Result<String> {
    let yaml = schema::dump(scenario).map_err(|e| RunnerError::Artifact(e.to_string()))?;
    let yaml = String::from_utf8_lossy(&yaml);
    let user_prompt = format!("Scenario:\n{yaml}\n\nDescribe in plain language what this scenario tests.");
    let text = port.generate("Explain what this browser test scenario does, in two or three sentences.", &user_prompt)
        .map_err(|e| RunnerError::Artifact(format!("explain completion failed: {e}")))?;
    if text.trim().is_empty() {
        return Err(RunnerError::Artifact("explain produced empty output".to_string()));
    }
    Ok(text)
}

fn count_secrets(scenario: &Scenario) -> usize {
    crate::artifacts::collect_secret_values(scenario).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoPort(String);
    impl CompletionPort for EchoPort {
        fn generate(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn draft_parses_and_validates_the_stub_response() {
        let port = StubCompletionPort::default();
        let scenario = draft(&port, "open the homepage").unwrap();
        assert_eq!(scenario.title, "sample scenario");
    }

    #[test]
    fn refine_rejects_a_response_that_drops_a_secret_flag() {
        let original = schema::load(
            br#"
title: t
base_url: https://example.com
vars: {}
steps:
  - fill:
      by: { testId: "password" }
      value: "hunter2"
      secret: true
"#,
        )
        .unwrap();

        let stripped = EchoPort(
            concat!(
                "title: t\n",
                "base_url: https://example.com\n",
                "vars: {}\n",
                "steps:\n",
                "  - fill:\n",
                "      by: { testId: \"password\" }\n",
                "      value: \"hunter2\"\n",
            )
            .to_string(),
        );

        let err = refine(&stripped, &original).unwrap_err();
        assert!(matches!(err, RunnerError::SecretLost { before: 1, after: 0 }));
    }

    #[test]
    fn explain_rejects_empty_output() {
        let scenario = schema::load(
            br#"
title: t
base_url: https://example.com
vars: {}
steps:
  - goto: https://example.com
"#,
        )
        .unwrap();
        let port = EchoPort(String::new());
        let err = explain(&port, &scenario).unwrap_err();
        assert!(matches!(err, RunnerError::Artifact(_)));
    }
}
