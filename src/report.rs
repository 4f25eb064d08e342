//! Reporter (§4.8) — JSON, self-contained HTML, and JUnit XML.
//!
//! Field names mirror the pre-existing `protocol::{StepResult, StepStatus,
//! ExecutionReport, ExecutionSummary}` shapes (status/duration_ms/error),
//! generalized from an HTTP-assertion result to a browser-step result and
//! extended with a screenshot pointer and two more sink formats.

use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step_name: String,
    pub kind: String,
    pub index: usize,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_steps(steps: &[StepOutcome]) -> Self {
        Summary {
            total: steps.len(),
            passed: steps.iter().filter(|s| s.status == StepStatus::Passed).count(),
            failed: steps.iter().filter(|s| s.status == StepStatus::Failed).count(),
            skipped: steps.iter().filter(|s| s.status == StepStatus::Skipped).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub title: String,
    pub status: StepStatus,
    pub started_at: String,
    pub finished_at: String,
    pub steps: Vec<StepOutcome>,
    pub summary: Summary,
}

impl ScenarioReport {
    pub fn new(title: String, started_at: String, finished_at: String, steps: Vec<StepOutcome>) -> Self {
        let overall = if steps.iter().any(|s| s.status == StepStatus::Failed) { StepStatus::Failed } else { StepStatus::Passed };
        let summary = Summary::from_steps(&steps);
        ScenarioReport { title, status: overall, started_at, finished_at, steps, summary }
    }

    pub fn write_json(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join("report.json");
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }

    pub fn write_html(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join("report.html");
        std::fs::write(&path, self.render_html())?;
        Ok(path)
    }

    pub fn write_junit(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join("junit.xml");
        std::fs::write(&path, self.render_junit()?)?;
        Ok(path)
    }

    fn render_html(&self) -> String {
        let status_class = match self.status {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        let mut rows = String::new();
        for step in &self.steps {
            let status_str = match step.status {
                StepStatus::Passed => "passed",
                StepStatus::Failed => "failed",
                StepStatus::Skipped => "skipped",
            };
            let error_cell = step.error.as_deref().unwrap_or("");
            let screenshot_cell = match &step.screenshot {
                Some(path) => format!(r#"<a href="{path}">screenshot</a>"#),
                None => String::new(),
            };
            rows.push_str(&format!(
                "<tr class=\"{status_str}\"><td>{}</td><td>{}</td><td>{status_str}</td><td>{}</td><td>{}</td><td>{screenshot_cell}</td></tr>\n",
                html_escape(&step.step_name),
                html_escape(&step.kind),
                step.duration_ms,
                html_escape(error_cell),
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
tr.passed {{ background: #eaffea; }}
tr.failed {{ background: #ffecec; }}
tr.skipped {{ background: #f0f0f0; }}
.summary {{ margin-bottom: 1rem; }}
.status.passed {{ color: green; }}
.status.failed {{ color: red; }}
</style></head>
<body>
<h1>{title}</h1>
<p class="status {status_class}">Overall: {status_class}</p>
<p class="summary">total={total} passed={passed} failed={failed} skipped={skipped}</p>
<table><thead><tr><th>name</th><th>kind</th><th>status</th><th>duration_ms</th><th>error</th><th>screenshot</th></tr></thead>
<tbody>
{rows}</tbody></table>
</body></html>
"#,
            title = html_escape(&self.title),
            status_class = status_class,
            total = self.summary.total,
            passed = self.summary.passed,
            failed = self.summary.failed,
            skipped = self.summary.skipped,
            rows = rows,
        )
    }

    fn render_junit(&self) -> anyhow::Result<String> {
        let suite = JunitSuite {
            name: self.title.clone(),
            tests: self.steps.len(),
            failures: self.summary.failed,
            time: total_seconds(&self.steps),
            testcases: self.steps.iter().map(|s| JunitCase::from_outcome(&self.title, s)).collect(),
        };
        let body = quick_xml::se::to_string(&suite)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites>\n{body}\n</testsuites>\n"))
    }
}

fn total_seconds(steps: &[StepOutcome]) -> f64 {
    steps.iter().map(|s| s.duration_ms as f64 / 1000.0).sum()
}

fn html_escape(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[derive(Serialize)]
#[serde(rename = "testsuite")]
struct JunitSuite {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@tests")]
    tests: usize,
    #[serde(rename = "@failures")]
    failures: usize,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(rename = "testcase")]
    testcases: Vec<JunitCase>,
}

#[derive(Serialize)]
#[serde(rename = "testcase")]
struct JunitCase {
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@time")]
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<JunitFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<JunitSkipped>,
}

#[derive(Serialize)]
struct JunitFailure {
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "$text")]
    text: String,
}

#[derive(Serialize)]
struct JunitSkipped {}

impl JunitCase {
    fn from_outcome(classname: &str, outcome: &StepOutcome) -> Self {
        let time = outcome.duration_ms as f64 / 1000.0;
        let failure = match (&outcome.status, &outcome.error) {
            (StepStatus::Failed, Some(err)) => Some(JunitFailure { message: err.clone(), text: err.clone() }),
            (StepStatus::Failed, None) => Some(JunitFailure { message: "step failed".into(), text: String::new() }),
            _ => None,
        };
        let skipped = matches!(outcome.status, StepStatus::Skipped).then_some(JunitSkipped {});
        JunitCase { classname: classname.to_string(), name: outcome.step_name.clone(), time, failure, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScenarioReport {
        let steps = vec![
            StepOutcome { step_name: "goto_0".into(), kind: "goto".into(), index: 0, status: StepStatus::Passed, duration_ms: 120, error: None, screenshot: None, section: None },
            StepOutcome { step_name: "click_1".into(), kind: "click".into(), index: 1, status: StepStatus::Failed, duration_ms: 50, error: Some("no match".into()), screenshot: Some("step001_click_1_error.png".into()), section: Some("login".into()) },
        ];
        ScenarioReport::new("login flow".into(), "2026-01-01T00:00:00Z".into(), "2026-01-01T00:00:01Z".into(), steps)
    }

    #[test]
    fn overall_status_is_failed_when_any_step_failed() {
        assert_eq!(sample().status, StepStatus::Failed);
    }

    #[test]
    fn summary_counts_match_steps() {
        let report = sample();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn html_contains_title_status_and_summary_counts() {
        let html = sample().render_html();
        assert!(html.contains("login flow"));
        assert!(html.contains("failed"));
        assert!(html.contains("total=2 passed=1 failed=1 skipped=0"));
    }

    #[test]
    fn junit_nests_failure_element_for_failed_case() {
        let xml = sample().render_junit().unwrap();
        assert!(xml.contains("<testsuite"));
        assert!(xml.contains("tests=\"2\""));
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("<failure"));
    }

    #[test]
    fn write_json_produces_a_parseable_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample().write_json(tmp.path()).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["summary"]["total"], 2);
    }
}
