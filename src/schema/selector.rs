//! The selector sum type (§3 "Selector spec").
//!
//! Each leaf is `deny_unknown_fields` so that `#[serde(untagged)]` picks the
//! right variant purely by shape, the same way the schema this was modeled
//! on used one strict Pydantic model per selector kind.

use serde::{Deserialize, Serialize};

fn default_strict() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestIdSelector {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSelector {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSelector {
    pub label: String,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaceholderSelector {
    pub placeholder: String,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CssSelector {
    pub css: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSelector {
    pub text: String,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

/// A selector leaf: every variant except `any` itself. Used both at the top
/// level and as the element type of `AnySelector::any`, which is how the
/// "no nested `any`" invariant is enforced by the type system rather than by
/// a runtime check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeafSelector {
    TestId(TestIdSelector),
    Role(RoleSelector),
    Label(LabelSelector),
    Placeholder(PlaceholderSelector),
    Css(CssSelector),
    Text(TextSelector),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnySelector {
    pub any: Vec<LeafSelector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Any(AnySelector),
    Leaf(LeafSelector),
}

impl Selector {
    pub fn is_text_only(&self) -> bool {
        matches!(self, Selector::Leaf(LeafSelector::Text(_)))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Selector::Any(_))
    }

    /// Every literal string value carried by this selector (used by the
    /// linter to spot credential-shaped text without walking each variant
    /// by hand at every call site).
    pub fn literal_values(&self) -> Vec<&str> {
        match self {
            Selector::Any(any) => any.any.iter().flat_map(LeafSelector::literal_values).collect(),
            Selector::Leaf(leaf) => leaf.literal_values(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Selector::Any(any) => {
                let inner: Vec<String> = any.any.iter().map(LeafSelector::describe).collect();
                format!("any=[{}]", inner.join(", "))
            }
            Selector::Leaf(leaf) => leaf.describe(),
        }
    }
}

impl LeafSelector {
    pub fn describe(&self) -> String {
        match self {
            LeafSelector::TestId(s) => format!("testId='{}'", s.test_id),
            LeafSelector::Role(s) => match &s.name {
                Some(name) => format!("role='{}', name='{}'", s.role, name),
                None => format!("role='{}'", s.role),
            },
            LeafSelector::Label(s) => format!("label='{}'", s.label),
            LeafSelector::Placeholder(s) => format!("placeholder='{}'", s.placeholder),
            LeafSelector::Css(s) => match &s.text {
                Some(text) => format!("css='{}', text='{}'", s.css, text),
                None => format!("css='{}'", s.css),
            },
            LeafSelector::Text(s) => format!("text='{}'", s.text),
        }
    }

    pub fn literal_values(&self) -> Vec<&str> {
        match self {
            LeafSelector::TestId(s) => vec![s.test_id.as_str()],
            LeafSelector::Role(s) => s.name.iter().map(String::as_str).collect(),
            LeafSelector::Label(s) => vec![s.label.as_str()],
            LeafSelector::Placeholder(s) => vec![s.placeholder.as_str()],
            LeafSelector::Css(s) => s.text.iter().map(String::as_str).collect(),
            LeafSelector::Text(s) => vec![s.text.as_str()],
        }
    }

    pub fn strict(&self) -> bool {
        match self {
            LeafSelector::TestId(s) => s.strict,
            LeafSelector::Role(s) => s.strict,
            LeafSelector::Label(s) => s.strict,
            LeafSelector::Placeholder(s) => s.strict,
            LeafSelector::Css(s) => s.strict,
            LeafSelector::Text(s) => s.strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_selectors_are_distinguished_by_shape() {
        let yaml = "testId: submit-button\n";
        let sel: Selector = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(sel, Selector::Leaf(LeafSelector::TestId(_))));

        let yaml = "role: button\nname: Submit\n";
        let sel: Selector = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(sel, Selector::Leaf(LeafSelector::Role(_))));

        let yaml = "css: '.btn'\ntext: Submit\n";
        let sel: Selector = serde_yaml::from_str(yaml).unwrap();
        match sel {
            Selector::Leaf(LeafSelector::Css(css)) => assert_eq!(css.text.as_deref(), Some("Submit")),
            other => panic!("expected css selector, got {other:?}"),
        }
    }

    #[test]
    fn any_selector_holds_leaves_only() {
        let yaml = "any:\n  - testId: a\n  - role: button\n    name: Submit\n";
        let sel: Selector = serde_yaml::from_str(yaml).unwrap();
        match sel {
            Selector::Any(any) => assert_eq!(any.any.len(), 2),
            other => panic!("expected any selector, got {other:?}"),
        }
    }

    #[test]
    fn describe_matches_documented_shape() {
        let sel = Selector::Leaf(LeafSelector::Role(RoleSelector {
            role: "button".into(),
            name: Some("Submit".into()),
            exact: None,
            strict: true,
        }));
        assert_eq!(sel.describe(), "role='button', name='Submit'");
    }

    #[test]
    fn text_only_detection() {
        let sel = Selector::Leaf(LeafSelector::Text(TextSelector { text: "Submit".into(), strict: true }));
        assert!(sel.is_text_only());
    }
}
