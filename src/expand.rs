//! Variable expander (§4.2).
//!
//! Exactly two reference forms are legal: `${env.NAME}` and `${vars.NAME}`.
//! Anything else matching `${...}` is rejected — at validation time by
//! `schema::load`, and here again at expansion time for references that are
//! grammatically legal but unresolved.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{RunnerError, Result};

/// Matches exactly `${env.NAME}` or `${vars.NAME}`.
pub static VAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{(env|vars)\.([A-Za-z_][A-Za-z0-9_]*)\}$").unwrap());

/// Matches any occurrence of a reference inside a larger string, for
/// substitution purposes.
static VAR_REFERENCE_INLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(env|vars)\.([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Owns the scenario-variable store for one scenario run. The environment
/// snapshot is immutable after construction; `vars` grows only through
/// [`VariableExpander::set_var`].
#[derive(Debug, Clone)]
pub struct VariableExpander {
    env: HashMap<String, String>,
    vars: HashMap<String, String>,
}

impl VariableExpander {
    /// Builds an expander seeded with a snapshot of the process environment
    /// and the scenario's own `vars` map.
    pub fn new(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let env = std::env::vars().collect();
        VariableExpander { env, vars: vars.into_iter().collect() }
    }

    /// Builds an expander from explicit env/vars maps, bypassing the real
    /// process environment. Used by tests and by anything embedding this
    /// engine that wants deterministic expansion.
    pub fn with_env(env: HashMap<String, String>, vars: HashMap<String, String>) -> Self {
        VariableExpander { env, vars }
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Substitutes every `${env.X}` / `${vars.X}` reference in `text`. The
    /// result is guaranteed to contain no `${...}` substring on success.
    pub fn expand(&self, text: &str) -> Result<String> {
        let mut err = None;
        let expanded = VAR_REFERENCE_INLINE.replace_all(text, |caps: &regex::Captures| {
            let namespace = &caps[1];
            let name = &caps[2];
            let resolved = match namespace {
                "env" => self.env.get(name),
                "vars" => self.vars.get(name),
                _ => None,
            };
            match resolved {
                Some(value) => value.clone(),
                None => {
                    err.get_or_insert((namespace.to_string(), name.to_string()));
                    String::new()
                }
            }
        });

        if let Some((namespace, name)) = err {
            return Err(RunnerError::UnresolvedVariable { namespace, name });
        }
        Ok(expanded.into_owned())
    }

    /// Recursively expands every string leaf of a JSON value; other leaves
    /// pass through unchanged. Map keys are never expanded.
    pub fn expand_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(self.expand(s)?)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.expand_value(item)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.expand_value(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander(env: &[(&str, &str)], vars: &[(&str, &str)]) -> VariableExpander {
        VariableExpander::with_env(
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn expands_env_and_vars_references() {
        let exp = expander(&[("BASE_URL", "http://h")], &[("endpoint", "users")]);
        let out = exp.expand("${env.BASE_URL}/api/${vars.endpoint}").unwrap();
        assert_eq!(out, "http://h/api/users");
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let exp = expander(&[], &[]);
        let err = exp.expand("${env.MISSING}").unwrap_err();
        match err {
            RunnerError::UnresolvedVariable { namespace, name } => {
                assert_eq!(namespace, "env");
                assert_eq!(name, "MISSING");
            }
            other => panic!("wrong error variant: {other:?}"),
        }
    }

    #[test]
    fn expansion_totality_no_residual_braces() {
        let exp = expander(&[("X", "1")], &[]);
        let out = exp.expand("prefix-${env.X}-suffix").unwrap();
        assert!(!out.contains("${"));
    }

    #[test]
    fn expand_value_recurses_into_containers() {
        let exp = expander(&[], &[("name", "alice")]);
        let value = serde_json::json!({"user": "${vars.name}", "tags": ["${vars.name}", 42]});
        let expanded = exp.expand_value(&value).unwrap();
        assert_eq!(expanded["user"], "alice");
        assert_eq!(expanded["tags"][0], "alice");
        assert_eq!(expanded["tags"][1], 42);
    }

    #[test]
    fn set_var_overwrites_and_is_visible_to_later_expansions() {
        let mut exp = expander(&[], &[]);
        exp.set_var("token", "abc123");
        assert_eq!(exp.expand("${vars.token}").unwrap(), "abc123");
        exp.set_var("token", "xyz789");
        assert_eq!(exp.expand("${vars.token}").unwrap(), "xyz789");
    }
}
