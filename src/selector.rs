//! Selector resolver (§4.3) — the most subtle logic in the system.
//!
//! Grounded directly on the original selector resolver: single-selector
//! resolution builds a locator and checks it against the strict/visible
//! rule; the `any` fallback tries candidates in order, first success wins;
//! healing (`safe` mode only) retries a fixed, small set of alternatives
//! derived from the failing selector before giving up.

use std::time::Duration;

use crate::browser::{Frame, Locator, Page};
use crate::error::RunnerError;
use crate::schema::selector::{CssSelector, LabelSelector, LeafSelector, PlaceholderSelector, RoleSelector, TestIdSelector, TextSelector};
use crate::schema::{HealingMode, Selector};

const FRAME_ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SelectorResolver {
    healing: HealingMode,
}

impl SelectorResolver {
    pub fn new(healing: HealingMode) -> Self {
        SelectorResolver { healing }
    }

    /// Resolves a selector spec into a live locator. `frame`, if given,
    /// names an iframe to resolve inside instead of the top-level page.
    pub async fn resolve(
        &self,
        page: &dyn Page,
        selector: &Selector,
        frame: Option<&str>,
    ) -> Result<Box<dyn Locator>, RunnerError> {
        let owned_frame;
        let target: &dyn Frame = match frame {
            Some(name) => {
                owned_frame = page.frame_locator(name).await;
                if let Err(e) = owned_frame.wait_body_attached(FRAME_ATTACH_TIMEOUT).await {
                    tracing::warn!(frame = name, error = %e, "iframe body wait timed out, continuing anyway");
                }
                owned_frame.as_ref()
            }
            None => page.as_frame(),
        };

        match selector {
            Selector::Any(any) => self.resolve_any(target, &any.any).await,
            Selector::Leaf(leaf) => self.resolve_leaf(target, leaf).await,
        }
    }

    async fn resolve_leaf(&self, frame: &dyn Frame, leaf: &LeafSelector) -> Result<Box<dyn Locator>, RunnerError> {
        match self.check_single(frame, leaf).await {
            Ok(locator) => Ok(locator),
            Err(reason) => {
                if self.healing == HealingMode::Safe {
                    if let Some(locator) = self.try_healing(frame, leaf).await {
                        return Ok(locator);
                    }
                }
                Err(RunnerError::SelectorResolution(format!(
                    "failed to resolve {}: {reason}",
                    leaf.describe()
                )))
            }
        }
    }

    /// Builds a locator for a single (non-`any`) selector and applies the
    /// strictness rule: zero matches is always an error; more than one
    /// match is an error only when `strict` is true.
    async fn check_single(&self, frame: &dyn Frame, leaf: &LeafSelector) -> Result<Box<dyn Locator>, String> {
        let locator = build_single(frame, leaf);
        let count = locator.count().await.map_err(|e| e.to_string())?;
        if count == 0 {
            return Err("no match".to_string());
        }
        if count > 1 && leaf.strict() {
            return Err(format!("ambiguous ({count} matches)"));
        }
        Ok(locator)
    }

    /// The `any` fallback: try every candidate in order, returning the
    /// first whose locator has exactly one (or, when not strict, any
    /// positive count of) visible match. Every skip reason is recorded so
    /// a total failure can report all of them.
    async fn resolve_any(&self, frame: &dyn Frame, candidates: &[LeafSelector]) -> Result<Box<dyn Locator>, RunnerError> {
        let mut failures = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let desc = candidate.describe();
            let locator = build_single(frame, candidate);

            let count = match locator.count().await {
                Ok(c) => c,
                Err(e) => {
                    failures.push(format!("[{index}] {desc}: {e}"));
                    continue;
                }
            };
            if count == 0 {
                failures.push(format!("[{index}] {desc}: no match"));
                continue;
            }
            if count > 1 && candidate.strict() {
                failures.push(format!("[{index}] {desc}: ambiguous ({count} matches)"));
                continue;
            }
            match locator.is_visible().await {
                Ok(true) => return Ok(locator),
                Ok(false) => failures.push(format!("[{index}] {desc}: present but hidden")),
                Err(e) => failures.push(format!("[{index}] {desc}: {e}")),
            }
        }

        Err(RunnerError::SelectorResolution(format!(
            "any fallback: all {} candidates were rejected:\n{}",
            candidates.len(),
            failures.join("\n")
        )))
    }

    /// `safe`-mode self-healing: tries the fixed set of alternatives for
    /// `original`'s kind, in order, applying the same 1-match-and-visible
    /// rule. Returns the first success, or `None` if every alternative
    /// (or none were generated) failed.
    async fn try_healing(&self, frame: &dyn Frame, original: &LeafSelector) -> Option<Box<dyn Locator>> {
        for candidate in build_healing_candidates(original) {
            let locator = build_single(frame, &candidate);
            let count = locator.count().await.unwrap_or(0);
            if count == 1 && locator.is_visible().await.unwrap_or(false) {
                tracing::info!(from = %original.describe(), to = %candidate.describe(), "selector healed");
                return Some(locator);
            }
        }
        None
    }
}

fn build_single(frame: &dyn Frame, selector: &LeafSelector) -> Box<dyn Locator> {
    match selector {
        LeafSelector::TestId(s) => frame.by_test_id(&s.test_id),
        LeafSelector::Role(s) => frame.by_role(&s.role, s.name.as_deref(), s.exact),
        LeafSelector::Label(s) => frame.by_label(&s.label),
        LeafSelector::Placeholder(s) => frame.by_placeholder(&s.placeholder),
        LeafSelector::Css(s) => frame.by_css(&s.css, s.text.as_deref()),
        LeafSelector::Text(s) => frame.by_text(&s.text),
    }
}

/// The fixed healing map (§4.3, normative — no other alternatives are ever
/// inferred).
fn build_healing_candidates(original: &LeafSelector) -> Vec<LeafSelector> {
    match original {
        LeafSelector::TestId(s) => vec![
            LeafSelector::Role(RoleSelector { role: "button".into(), name: Some(s.test_id.clone()), exact: None, strict: true }),
            LeafSelector::Label(LabelSelector { label: s.test_id.clone(), strict: true }),
        ],
        LeafSelector::Role(s) => match &s.name {
            Some(name) => vec![
                LeafSelector::TestId(TestIdSelector { test_id: name.clone(), strict: true }),
                LeafSelector::Label(LabelSelector { label: name.clone(), strict: true }),
            ],
            None => Vec::new(),
        },
        LeafSelector::Label(s) => vec![
            LeafSelector::TestId(TestIdSelector { test_id: s.label.clone(), strict: true }),
            LeafSelector::Role(RoleSelector { role: "textbox".into(), name: Some(s.label.clone()), exact: None, strict: true }),
        ],
        LeafSelector::Css(s) => match &s.text {
            Some(text) => vec![
                LeafSelector::Text(TextSelector { text: text.clone(), strict: true }),
                LeafSelector::Label(LabelSelector { label: text.clone(), strict: true }),
            ],
            None => Vec::new(),
        },
        LeafSelector::Text(s) => vec![LeafSelector::Label(LabelSelector { label: s.text.clone(), strict: true })],
        LeafSelector::Placeholder(s) => vec![
            LeafSelector::Label(LabelSelector { label: s.placeholder.clone(), strict: true }),
            LeafSelector::TestId(TestIdSelector { test_id: s.placeholder.clone(), strict: true }),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{ImageEncoding, WaitState};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// A deterministic fake matching one fixed kind/key combination to a
    /// count/visibility pair, so resolver logic can be exercised without a
    /// live browser.
    #[derive(Default)]
    struct FakeFrame {
        elements: HashMap<(&'static str, String), (usize, bool)>,
        healed: Arc<Mutex<Vec<String>>>,
    }

    #[derive(Debug)]
    struct FakeLocator {
        count: usize,
        visible: bool,
    }

    #[async_trait]
    impl Locator for FakeLocator {
        async fn count(&self) -> anyhow::Result<usize> {
            Ok(self.count)
        }
        async fn is_visible(&self) -> anyhow::Result<bool> {
            Ok(self.visible)
        }
        async fn click(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn dblclick(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn fill(&self, _value: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn press_key(&self, _key: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn check(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn uncheck(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn select_option(&self, _value: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn scroll_into_view(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn scroll_container_by(&self, _dx: i64, _dy: i64) -> anyhow::Result<()> {
            Ok(())
        }
        async fn container_client_height(&self) -> anyhow::Result<f64> {
            Ok(0.0)
        }
        async fn text_content(&self) -> anyhow::Result<String> {
            Ok(String::new())
        }
        async fn attribute(&self, _name: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn wait_for(&self, _state: WaitState, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }
        async fn set_input_files(&self, _path: &str) -> anyhow::Result<()> {
            Ok(())
        }
        async fn screenshot(&self, _encoding: ImageEncoding) -> anyhow::Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn by_text(&self, _text: &str) -> anyhow::Result<Box<dyn Locator>> {
            Ok(Box::new(FakeLocator { count: self.count, visible: self.visible }))
        }
    }

    #[async_trait]
    impl Frame for FakeFrame {
        async fn wait_body_attached(&self, _timeout: Duration) -> anyhow::Result<()> {
            Ok(())
        }
        fn by_test_id(&self, id: &str) -> Box<dyn Locator> {
            self.lookup("testId", id)
        }
        fn by_role(&self, role: &str, name: Option<&str>, _exact: Option<bool>) -> Box<dyn Locator> {
            let key = match name {
                Some(n) => format!("{role}:{n}"),
                None => role.to_string(),
            };
            self.lookup("role", &key)
        }
        fn by_label(&self, text: &str) -> Box<dyn Locator> {
            self.lookup("label", text)
        }
        fn by_placeholder(&self, text: &str) -> Box<dyn Locator> {
            self.lookup("placeholder", text)
        }
        fn by_text(&self, text: &str) -> Box<dyn Locator> {
            self.lookup("text", text)
        }
        fn by_css(&self, css: &str, _has_text: Option<&str>) -> Box<dyn Locator> {
            self.lookup("css", css)
        }
    }

    impl FakeFrame {
        fn lookup(&self, kind: &'static str, key: &str) -> Box<dyn Locator> {
            let (count, visible) = self.elements.get(&(kind, key.to_string())).copied().unwrap_or((0, false));
            Box::new(FakeLocator { count, visible })
        }
    }

    fn test_id(id: &str) -> LeafSelector {
        LeafSelector::TestId(TestIdSelector { test_id: id.to_string(), strict: true })
    }

    fn role(role_name: &str, name: &str) -> LeafSelector {
        LeafSelector::Role(RoleSelector { role: role_name.to_string(), name: Some(name.to_string()), exact: None, strict: true })
    }

    #[tokio::test]
    async fn any_fallback_returns_first_viable_candidate() {
        let mut elements = HashMap::new();
        elements.insert(("testId", "a".to_string()), (0, false));
        elements.insert(("role", "button:Submit".to_string()), (1, true));
        let frame = FakeFrame { elements, ..Default::default() };

        let resolver = SelectorResolver::new(HealingMode::Off);
        let candidates = vec![test_id("a"), role("button", "Submit")];
        let locator = resolver.resolve_any(&frame, &candidates).await.expect("should resolve");
        assert_eq!(locator.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn any_fallback_reports_every_failure_when_exhausted() {
        let frame = FakeFrame::default();
        let resolver = SelectorResolver::new(HealingMode::Off);
        let candidates = vec![test_id("a"), role("button", "Submit")];
        let err = resolver.resolve_any(&frame, &candidates).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("testId='a'"));
        assert!(text.contains("role='button', name='Submit'"));
    }

    #[tokio::test]
    async fn strict_leaf_errors_on_multiple_matches_outside_any() {
        let mut elements = HashMap::new();
        elements.insert(("testId", "dup".to_string()), (2, true));
        let frame = FakeFrame { elements, ..Default::default() };
        let resolver = SelectorResolver::new(HealingMode::Off);

        let err = resolver.resolve_leaf(&frame, &test_id("dup")).await.unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[tokio::test]
    async fn healing_off_never_constructs_alternatives() {
        let frame = FakeFrame::default();
        let resolver = SelectorResolver::new(HealingMode::Off);
        let err = resolver.resolve_leaf(&frame, &test_id("submit")).await.unwrap_err();
        assert!(err.to_string().contains("failed to resolve testId='submit'"));
    }

    #[tokio::test]
    async fn healing_safe_falls_back_to_role_then_label() {
        let mut elements = HashMap::new();
        elements.insert(("role", "button:submit".to_string()), (1, true));
        let frame = FakeFrame { elements, ..Default::default() };
        let resolver = SelectorResolver::new(HealingMode::Safe);

        let locator = resolver.resolve_leaf(&frame, &test_id("submit")).await.expect("healing should succeed");
        assert_eq!(locator.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn healing_exhausted_propagates_original_error() {
        let frame = FakeFrame::default();
        let resolver = SelectorResolver::new(HealingMode::Safe);
        let err = resolver.resolve_leaf(&frame, &test_id("submit")).await.unwrap_err();
        assert!(err.to_string().contains("failed to resolve testId='submit'"));
    }

    #[test]
    fn healing_map_matches_documented_table() {
        let candidates = build_healing_candidates(&test_id("x"));
        assert_eq!(candidates.len(), 2);
        assert!(matches!(candidates[0], LeafSelector::Role(_)));
        assert!(matches!(candidates[1], LeafSelector::Label(_)));

        let role_no_name = LeafSelector::Role(RoleSelector { role: "button".into(), name: None, exact: None, strict: true });
        assert!(build_healing_candidates(&role_no_name).is_empty());

        let css_no_text = LeafSelector::Css(CssSelector { css: ".x".into(), text: None, strict: true });
        assert!(build_healing_candidates(&css_no_text).is_empty());
    }
}
