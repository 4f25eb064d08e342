//! Scenario schema & loader (§4.1).
//!
//! `Scenario` is the root, immutable-after-load document type. `StepEntry`
//! stays deliberately loose at parse time (a single kind key plus common
//! keys) — handler-level parameter validation is delegated to each
//! handler's own schema (§4.4), not encoded here as dozens of step structs.

pub mod selector;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;
use crate::expand::VAR_REFERENCE;

pub use selector::{AnySelector, LeafSelector, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealingMode {
    #[default]
    Off,
    Safe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    #[default]
    BeforeEachStep,
    BeforeAndAfter,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactMode {
    #[default]
    OnFailure,
    Always,
    None,
}

fn default_quality() -> u8 {
    70
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotsConfig {
    #[serde(default)]
    pub mode: ScreenshotMode,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

impl Default for ScreenshotsConfig {
    fn default() -> Self {
        ScreenshotsConfig { mode: ScreenshotMode::default(), format: ImageFormat::default(), quality: default_quality() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TraceConfig {
    #[serde(default)]
    pub mode: ArtifactMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoConfig {
    #[serde(default)]
    pub mode: ArtifactMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub screenshots: ScreenshotsConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Hooks {
    #[serde(default)]
    pub before_each_step: Vec<StepEntry>,
    #[serde(default)]
    pub after_each_step: Vec<StepEntry>,
}

/// A single entry in a scenario's step list: either a named `section`
/// grouping child entries, or a leaf step tagged by its one kind key.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEntry {
    Section { name: String, steps: Vec<StepEntry> },
    Step { kind: String, name: Option<String>, frame: Option<String>, secret: Option<bool>, params: serde_yaml::Value },
}

impl StepEntry {
    pub fn name_or_synthesized(&self, index: usize) -> String {
        match self {
            StepEntry::Section { name, .. } => name.clone(),
            StepEntry::Step { kind, name, .. } => name.clone().unwrap_or_else(|| format!("{kind}_{index}")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepEntryParseError {
    #[error("step entry must be a mapping")]
    NotAMapping,
    #[error("step entry has no kind key (only common keys name/frame/secret were present)")]
    NoKindKey,
    #[error("step entry has more than one kind key: {0:?}")]
    MultipleKindKeys(Vec<String>),
    #[error("section entry's value must be a mapping with 'name' and 'steps'")]
    InvalidSection,
    #[error("section 'name' must be a string")]
    InvalidSectionName,
    #[error(transparent)]
    Nested(#[from] Box<StepEntryParseError>),
}

impl TryFrom<serde_yaml::Value> for StepEntry {
    type Error = StepEntryParseError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        let serde_yaml::Value::Mapping(map) = value else {
            return Err(StepEntryParseError::NotAMapping);
        };

        let mut name = None;
        let mut frame = None;
        let mut secret = None;
        let mut kind_keys: Vec<(String, serde_yaml::Value)> = Vec::new();

        for (k, v) in map {
            let serde_yaml::Value::String(key) = k else { continue };
            match key.as_str() {
                "name" => name = v.as_str().map(str::to_string),
                "frame" => frame = v.as_str().map(str::to_string),
                "secret" => secret = v.as_bool(),
                other => kind_keys.push((other.to_string(), v)),
            }
        }

        if kind_keys.len() > 1 {
            return Err(StepEntryParseError::MultipleKindKeys(kind_keys.into_iter().map(|(k, _)| k).collect()));
        }
        let Some((kind, value)) = kind_keys.into_iter().next() else {
            return Err(StepEntryParseError::NoKindKey);
        };

        if kind == "section" {
            let serde_yaml::Value::Mapping(section_map) = value else {
                return Err(StepEntryParseError::InvalidSection);
            };
            let mut section_name = None;
            let mut steps = Vec::new();
            for (k, v) in section_map {
                let serde_yaml::Value::String(key) = k else { continue };
                match key.as_str() {
                    "name" => {
                        section_name = Some(v.as_str().ok_or(StepEntryParseError::InvalidSectionName)?.to_string())
                    }
                    "steps" => {
                        let serde_yaml::Value::Sequence(seq) = v else { return Err(StepEntryParseError::InvalidSection) };
                        for item in seq {
                            steps.push(StepEntry::try_from(item).map_err(|e| StepEntryParseError::Nested(Box::new(e)))?);
                        }
                    }
                    _ => {}
                }
            }
            let section_name = section_name.ok_or(StepEntryParseError::InvalidSection)?;
            return Ok(StepEntry::Section { name: section_name, steps });
        }

        Ok(StepEntry::Step { kind, name, frame, secret, params: value })
    }
}

impl From<StepEntry> for serde_yaml::Value {
    fn from(entry: StepEntry) -> Self {
        let mut map = serde_yaml::Mapping::new();
        match entry {
            StepEntry::Section { name, steps } => {
                let mut inner = serde_yaml::Mapping::new();
                inner.insert("name".into(), name.into());
                inner.insert("steps".into(), serde_yaml::Value::Sequence(steps.into_iter().map(Into::into).collect()));
                map.insert("section".into(), serde_yaml::Value::Mapping(inner));
            }
            StepEntry::Step { kind, name, frame, secret, params } => {
                map.insert(kind.into(), params);
                if let Some(name) = name {
                    map.insert("name".into(), name.into());
                }
                if let Some(frame) = frame {
                    map.insert("frame".into(), frame.into());
                }
                if let Some(secret) = secret {
                    map.insert("secret".into(), secret.into());
                }
            }
        }
        serde_yaml::Value::Mapping(map)
    }
}

impl Serialize for StepEntry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_yaml::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StepEntry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        StepEntry::try_from(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    pub base_url: String,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub hooks: Hooks,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
    #[serde(default)]
    pub healing: HealingMode,
}

/// Mirrors `Scenario`, but leaves every step list as raw YAML values instead
/// of `StepEntry` — so a malformed step anywhere in the document never
/// fails the whole-document deserialize, and `load` can walk every entry
/// itself to collect every problem instead of stopping at the first one.
#[derive(Debug, Deserialize)]
struct RawScenario {
    title: String,
    base_url: String,
    #[serde(default)]
    vars: BTreeMap<String, String>,
    #[serde(default)]
    artifacts: ArtifactsConfig,
    #[serde(default)]
    hooks: RawHooks,
    #[serde(default)]
    steps: Vec<serde_yaml::Value>,
    #[serde(default)]
    healing: HealingMode,
}

#[derive(Debug, Default, Deserialize)]
struct RawHooks {
    #[serde(default)]
    before_each_step: Vec<serde_yaml::Value>,
    #[serde(default)]
    after_each_step: Vec<serde_yaml::Value>,
}

/// Parses and validates a scenario document.
///
/// A malformed YAML document (wrong top-level shape, unparsable scalar)
/// fails the whole parse and is reported as a single `<root>` issue. Past
/// that point, every step entry — at the top level, inside hooks, and
/// nested inside a `section`'s own `steps` list — is parsed independently:
/// a step with zero or multiple kind keys never short-circuits the rest, so
/// a document with several malformed steps reports one issue per step, each
/// carrying that step's own path. Semantic rules run last and are checked
/// independently of one another as before.
pub fn load(bytes: &[u8]) -> Result<Scenario, Vec<ValidationIssue>> {
    let raw: RawScenario = serde_yaml::from_slice(bytes).map_err(|e| {
        vec![ValidationIssue { path: "<root>".to_string(), message: e.to_string(), line: e.location().map(|l| l.line()) }]
    })?;

    let mut issues = Vec::new();
    let steps = parse_step_list(raw.steps, "steps", &mut issues);
    let before_each_step = parse_step_list(raw.hooks.before_each_step, "hooks.before_each_step", &mut issues);
    let after_each_step = parse_step_list(raw.hooks.after_each_step, "hooks.after_each_step", &mut issues);

    let scenario = Scenario {
        title: raw.title,
        base_url: raw.base_url,
        vars: raw.vars,
        artifacts: raw.artifacts,
        hooks: Hooks { before_each_step, after_each_step },
        steps,
        healing: raw.healing,
    };

    issues.extend(validate(&scenario));
    if issues.is_empty() {
        Ok(scenario)
    } else {
        Err(issues)
    }
}

/// Parses every entry in a raw step list, pushing one issue per malformed
/// entry onto `issues` and skipping it, rather than failing on the first.
fn parse_step_list(raw: Vec<serde_yaml::Value>, path: &str, issues: &mut Vec<ValidationIssue>) -> Vec<StepEntry> {
    let mut out = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        if let Some(entry) = parse_step_entry(value, &format!("{path}[{idx}]"), issues) {
            out.push(entry);
        }
    }
    out
}

/// Parses one step entry. A `section` entry's own nested `steps` are parsed
/// through [`parse_step_list`] again, so a malformed entry three levels deep
/// inside nested sections is reported at its own path without blocking any
/// of its siblings.
fn parse_step_entry(value: serde_yaml::Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Option<StepEntry> {
    let serde_yaml::Value::Mapping(map) = value else {
        issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::NotAMapping.to_string(), line: None });
        return None;
    };

    let mut name = None;
    let mut frame = None;
    let mut secret = None;
    let mut kind_keys: Vec<(String, serde_yaml::Value)> = Vec::new();

    for (k, v) in map {
        let serde_yaml::Value::String(key) = k else { continue };
        match key.as_str() {
            "name" => name = v.as_str().map(str::to_string),
            "frame" => frame = v.as_str().map(str::to_string),
            "secret" => secret = v.as_bool(),
            other => kind_keys.push((other.to_string(), v)),
        }
    }

    if kind_keys.len() > 1 {
        let names = kind_keys.into_iter().map(|(k, _)| k).collect();
        issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::MultipleKindKeys(names).to_string(), line: None });
        return None;
    }
    let Some((kind, value)) = kind_keys.into_iter().next() else {
        issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::NoKindKey.to_string(), line: None });
        return None;
    };

    if kind == "section" {
        let serde_yaml::Value::Mapping(section_map) = value else {
            issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::InvalidSection.to_string(), line: None });
            return None;
        };
        let mut section_name = None;
        let mut raw_steps = Vec::new();
        for (k, v) in section_map {
            let serde_yaml::Value::String(key) = k else { continue };
            match key.as_str() {
                "name" => match v.as_str() {
                    Some(n) => section_name = Some(n.to_string()),
                    None => issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::InvalidSectionName.to_string(), line: None }),
                },
                "steps" => match v {
                    serde_yaml::Value::Sequence(seq) => raw_steps = seq,
                    _ => issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::InvalidSection.to_string(), line: None }),
                },
                _ => {}
            }
        }
        let Some(section_name) = section_name else {
            issues.push(ValidationIssue { path: path.to_string(), message: StepEntryParseError::InvalidSection.to_string(), line: None });
            return None;
        };
        let steps = parse_step_list(raw_steps, &format!("{path}.steps"), issues);
        return Some(StepEntry::Section { name: section_name, steps });
    }

    Some(StepEntry::Step { kind, name, frame, secret, params: value })
}

/// Serializes a scenario back to YAML bytes. `load(dump(s))` reproduces `s`
/// field-by-field.
pub fn dump(scenario: &Scenario) -> Result<Vec<u8>, serde_yaml::Error> {
    serde_yaml::to_string(scenario).map(String::into_bytes)
}

fn validate(scenario: &Scenario) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if scenario.title.trim().is_empty() {
        issues.push(ValidationIssue { path: "title".into(), message: "must be non-empty".into(), line: None });
    }
    if scenario.base_url.trim().is_empty() {
        issues.push(ValidationIssue { path: "base_url".into(), message: "must be non-empty".into(), line: None });
    } else if !(scenario.base_url.starts_with("http://") || scenario.base_url.starts_with("https://")) {
        issues.push(ValidationIssue {
            path: "base_url".into(),
            message: "must be an absolute http(s) URL".into(),
            line: None,
        });
    }

    let quality = scenario.artifacts.screenshots.quality;
    if !(1..=100).contains(&quality) {
        issues.push(ValidationIssue {
            path: "artifacts.screenshots.quality".into(),
            message: format!("must be in [1,100], got {quality}"),
            line: None,
        });
    }

    for (name, value) in &scenario.vars {
        if let Some(bad) = first_illegal_reference(value) {
            issues.push(ValidationIssue {
                path: format!("vars.{name}"),
                message: format!("contains an illegal variable reference: {bad}"),
                line: None,
            });
        }
    }

    validate_steps(&scenario.steps, "steps", &mut issues);
    validate_steps(&scenario.hooks.before_each_step, "hooks.before_each_step", &mut issues);
    validate_steps(&scenario.hooks.after_each_step, "hooks.after_each_step", &mut issues);

    issues
}

fn validate_steps(steps: &[StepEntry], path: &str, issues: &mut Vec<ValidationIssue>) {
    for (idx, step) in steps.iter().enumerate() {
        let here = format!("{path}[{idx}]");
        match step {
            StepEntry::Section { steps, .. } => validate_steps(steps, &here, issues),
            StepEntry::Step { params, .. } => validate_any_selectors(params, &here, issues),
        }
    }
}

/// Finds any `any:` selector in a step's raw params whose candidate list is
/// empty — the one `Any` shape invariant that survives past ordinary
/// deserialization (an empty `Vec` is a perfectly valid `Vec<LeafSelector>`).
fn validate_any_selectors(value: &serde_yaml::Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                if let serde_yaml::Value::String(key) = k {
                    if key == "any" {
                        if let serde_yaml::Value::Sequence(seq) = v {
                            if seq.is_empty() {
                                issues.push(ValidationIssue {
                                    path: format!("{path}.any"),
                                    message: "any.candidates must be non-empty".into(),
                                    line: None,
                                });
                            }
                        }
                    }
                    validate_any_selectors(v, &format!("{path}.{key}"), issues);
                }
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for (idx, item) in seq.iter().enumerate() {
                validate_any_selectors(item, &format!("{path}[{idx}]"), issues);
            }
        }
        _ => {}
    }
}

/// Returns the first `${...}` substring in `text` that is not a legal
/// `${env.NAME}` / `${vars.NAME}` reference, if any.
fn first_illegal_reference(text: &str) -> Option<String> {
    static ANY_BRACE: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new(r"\$\{[^}]*\}").unwrap());

    for m in ANY_BRACE.find_iter(text) {
        if !VAR_REFERENCE.is_match(m.as_str()) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
title: Login flow
base_url: https://example.test
steps:
  - goto: "${env.BASE_URL}"
  - click:
      by:
        testId: login-button
  - section:
      name: fill credentials
      steps:
        - fill:
            by: { testId: username }
            value: alice
"#;

    #[test]
    fn loads_minimal_scenario() {
        let scenario = load(MINIMAL.as_bytes()).expect("should load");
        assert_eq!(scenario.title, "Login flow");
        assert_eq!(scenario.steps.len(), 3);
        match &scenario.steps[2] {
            StepEntry::Section { name, steps } => {
                assert_eq!(name, "fill credentials");
                assert_eq!(steps.len(), 1);
            }
            other => panic!("expected section, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_dump_and_load() {
        let scenario = load(MINIMAL.as_bytes()).unwrap();
        let bytes = dump(&scenario).unwrap();
        let reloaded = load(&bytes).unwrap();
        assert_eq!(scenario, reloaded);
    }

    #[test]
    fn rejects_empty_title() {
        let yaml = "title: \"\"\nbase_url: https://example.test\nsteps: []\n";
        let err = load(yaml.as_bytes()).unwrap_err();
        assert!(err.iter().any(|i| i.path == "title"));
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let yaml = r#"
title: t
base_url: https://example.test
artifacts:
  screenshots:
    quality: 255
steps: []
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert!(err.iter().any(|i| i.path == "artifacts.screenshots.quality"));
    }

    #[test]
    fn rejects_illegal_variable_namespace() {
        let yaml = r#"
title: t
base_url: https://example.test
vars:
  bad: "${secrets.TOKEN}"
steps: []
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert!(err.iter().any(|i| i.path == "vars.bad"));
    }

    #[test]
    fn rejects_empty_any_candidates() {
        let yaml = r#"
title: t
base_url: https://example.test
steps:
  - click:
      by:
        any: []
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert!(err.iter().any(|i| i.path.ends_with(".any")));
    }

    #[test]
    fn rejects_two_kind_keys_as_a_step_level_issue() {
        let yaml = r#"
title: t
base_url: https://example.test
steps:
  - click: {}
    fill: {}
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].path, "steps[0]");
    }

    #[test]
    fn collects_every_malformed_step_instead_of_stopping_at_the_first() {
        let yaml = r#"
title: t
base_url: https://example.test
steps:
  - click: {}
    fill: {}
  - goto: "https://example.test/"
  - {}
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert_eq!(err.len(), 2, "the valid goto step in between must not be swallowed: {err:?}");
        assert_eq!(err[0].path, "steps[0]");
        assert_eq!(err[1].path, "steps[2]");
    }

    #[test]
    fn collects_a_malformed_step_nested_inside_a_section() {
        let yaml = r#"
title: t
base_url: https://example.test
steps:
  - section:
      name: setup
      steps:
        - click: {}
          fill: {}
        - goto: "https://example.test/"
"#;
        let err = load(yaml.as_bytes()).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].path, "steps[0].steps[0]");
    }
}
