//! Linter (§4.9) — advisory-only static checks over a parsed scenario.
//!
//! Rules and structure are grounded on the original `DslLinter`: the same
//! three checks, the same step/line walking order (sections flatten without
//! consuming a line number of their own), generalized from an untyped dict
//! walk to the typed `Scenario`/`Selector` model this crate already has.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::schema::selector::LeafSelector;
use crate::schema::{Scenario, Selector, StepEntry};

/// Broader than the original's keyword set: adds `passwd`, `api.?key`, and
/// two more Japanese loanwords (see DESIGN.md open-question decision).
static PASSWORD_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|secret|token|api.?key|credential|パスワード|トークン|暗証|passphrase|pin)").unwrap()
});

const SELECTOR_BEARING_KINDS: &[&str] = &[
    "click", "dblclick", "fill", "press", "check", "uncheck", "select_option", "wait_for", "wait_for_visible",
    "wait_for_hidden", "expect_visible", "expect_hidden", "expect_text", "store_text", "store_attr", "dump_dom",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    pub step_name: String,
    pub line_number: usize,
    pub severity: LintSeverity,
    pub rule: &'static str,
    pub message: String,
}

/// Runs every rule over `scenario` and returns issues ordered by
/// `(line_number, rule)`, matching the documented deterministic output.
pub fn lint(scenario: &Scenario) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let flat = flatten(&scenario.steps, 1);

    for (line_number, step) in &flat {
        if let Some(issue) = check_text_only_selector(step, *line_number) {
            issues.push(issue);
        }
        if let Some(issue) = check_missing_any_fallback(step, *line_number) {
            issues.push(issue);
        }
        if let Some(issue) = check_missing_secret(step, *line_number) {
            issues.push(issue);
        }
    }

    issues.sort_by(|a, b| a.line_number.cmp(&b.line_number).then(a.rule.cmp(b.rule)));
    issues
}

fn flatten<'a>(steps: &'a [StepEntry], base_line: usize) -> Vec<(usize, &'a StepEntry)> {
    let mut result = Vec::new();
    let mut line = base_line;
    for step in steps {
        match step {
            StepEntry::Section { steps: inner, .. } => {
                result.extend(flatten(inner, line));
                line += inner.len();
            }
            other => {
                result.push((line, other));
                line += 1;
            }
        }
    }
    result
}

fn step_name(step: &StepEntry) -> String {
    match step {
        StepEntry::Step { name: Some(name), .. } => name.clone(),
        StepEntry::Step { kind, .. } => kind.clone(),
        StepEntry::Section { name, .. } => name.clone(),
    }
}

fn extract_selector(step: &StepEntry) -> Option<Selector> {
    let StepEntry::Step { kind, params, .. } = step else { return None };
    if !SELECTOR_BEARING_KINDS.contains(&kind.as_str()) {
        return None;
    }
    let by = params.get("by")?;
    serde_yaml::from_value(by.clone()).ok()
}

fn check_text_only_selector(step: &StepEntry, line_number: usize) -> Option<LintIssue> {
    let selector = extract_selector(step)?;
    if let Selector::Leaf(LeafSelector::Text(_)) = selector {
        return Some(LintIssue {
            step_name: step_name(step),
            line_number,
            severity: LintSeverity::Warning,
            rule: "text-only-selector",
            message: "a text selector is used alone; prefer testId / role+name / css+text, which are more stable".to_string(),
        });
    }
    None
}

fn check_missing_any_fallback(step: &StepEntry, line_number: usize) -> Option<LintIssue> {
    let selector = extract_selector(step)?;
    if matches!(selector, Selector::Any(_)) {
        return None;
    }
    Some(LintIssue {
        step_name: step_name(step),
        line_number,
        severity: LintSeverity::Info,
        rule: "missing-any-fallback",
        message: "no any fallback is configured; listing multiple candidate selectors improves resilience to markup changes".to_string(),
    })
}

fn check_missing_secret(step: &StepEntry, line_number: usize) -> Option<LintIssue> {
    let StepEntry::Step { kind, secret, params, .. } = step else { return None };
    if kind != "fill" {
        return None;
    }
    if secret.unwrap_or(false) {
        return None;
    }

    let mut texts = vec![step_name(step)];
    if let Some(value) = params.get("value").and_then(|v| v.as_str()) {
        texts.push(value.to_string());
    }
    if let Some(selector) = extract_selector(step) {
        texts.extend(selector.literal_values().into_iter().map(str::to_string));
    }

    if texts.iter().any(|t| PASSWORD_KEYWORDS.is_match(t)) {
        return Some(LintIssue {
            step_name: step_name(step),
            line_number,
            severity: LintSeverity::Warning,
            rule: "missing-secret",
            message: "this field looks like a credential but lacks secret: true; values would appear unmasked in logs and reports".to_string(),
        });
    }
    None
}
