//! Flag definitions

use crate::error::{BuildError, BuildResult};
use crate::flag::{coerce, FlagKind, FlagValue};
use regex::Regex;
use std::sync::OnceLock;

/// What the shell should offer for a flag's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionHint {
    /// File paths, optionally restricted to the given extensions
    Files { extensions: Vec<String> },
    /// Directories only
    Directories,
}

/// A typed flag definition
#[derive(Debug, Clone)]
pub struct FlagSpec {
    name: String,
    short: Option<char>,
    kind: FlagKind,
    description: Option<String>,
    default_raw: Option<String>,
    default: FlagValue,
    no_opt: Option<String>,
    env: Option<String>,
    required: bool,
    persistent: bool,
    hidden: bool,
    deprecated: Option<String>,
    values: Vec<String>,
    completion: Option<CompletionHint>,
}

impl FlagSpec {
    /// Create a flag of the given kind with its zero value as default
    pub fn new(name: impl Into<String>, kind: FlagKind) -> Self {
        FlagSpec {
            name: name.into(),
            short: None,
            kind,
            description: None,
            default_raw: None,
            default: FlagValue::zero(kind),
            no_opt: None,
            env: None,
            required: false,
            persistent: false,
            hidden: false,
            deprecated: None,
            values: Vec::new(),
            completion: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::String)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::List)
    }

    pub fn duration(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Duration)
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, FlagKind::Count)
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Default value as raw text; coerced when the flag is registered
    pub fn default(mut self, raw: impl Into<String>) -> Self {
        self.default_raw = Some(raw.into());
        self
    }

    /// Value used when the flag is given without one, either last on the
    /// line or followed by another flag. `--color` then means `--color=auto`
    /// while `--color never` still works.
    pub fn no_opt_default(mut self, raw: impl Into<String>) -> Self {
        self.no_opt = Some(raw.into());
        self
    }

    /// Environment variable consulted when the flag is not given
    pub fn env(mut self, key: impl Into<String>) -> Self {
        self.env = Some(key.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Make the flag visible to every descendant command
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    /// Restrict the flag to a closed set of values
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn completion(mut self, hint: CompletionHint) -> Self {
        self.completion = Some(hint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorthand(&self) -> Option<char> {
        self.short
    }

    pub fn kind(&self) -> FlagKind {
        self.kind
    }

    pub fn about(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn no_opt_value(&self) -> Option<&str> {
        self.no_opt.as_deref()
    }

    pub fn env_key(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.values
    }

    pub fn completion_hint(&self) -> Option<&CompletionHint> {
        self.completion.as_ref()
    }

    /// Human-readable description of what this flag accepts
    pub fn expected(&self) -> String {
        if self.values.is_empty() {
            self.kind.to_string()
        } else {
            format!("one of [{}]", self.values.join(", "))
        }
    }

    /// Coerce one raw occurrence, enforcing the closed value set if any.
    ///
    /// On failure returns the description of what was expected.
    pub fn coerce(&self, raw: &str) -> Result<FlagValue, String> {
        if !self.values.is_empty() && !self.values.iter().any(|v| v == raw) {
            return Err(self.expected());
        }
        coerce(self.kind, raw).ok_or_else(|| self.expected())
    }

    /// Validate names and coerce the declared default
    pub(crate) fn finalize(mut self) -> BuildResult<Self> {
        if !is_valid_flag_name(&self.name) {
            return Err(BuildError::InvalidName {
                what: "flag",
                name: self.name,
            });
        }
        if let Some(c) = self.short {
            if !c.is_ascii_alphabetic() {
                return Err(BuildError::InvalidName {
                    what: "shorthand",
                    name: c.to_string(),
                });
            }
        }
        if let Some(raw) = &self.default_raw {
            self.default = match self.kind {
                // a list default is a comma separated set of elements
                FlagKind::List => FlagValue::List(split_list(raw)),
                _ => self.coerce(raw).map_err(|expected| BuildError::InvalidDefault {
                    flag: self.name.clone(),
                    raw: raw.clone(),
                    expected,
                })?,
            };
        }
        if let Some(raw) = &self.no_opt {
            if self.coerce(raw).is_err() || !self.kind.takes_value() {
                return Err(BuildError::InvalidDefault {
                    flag: self.name.clone(),
                    raw: raw.clone(),
                    expected: self.expected(),
                });
            }
        }
        Ok(self)
    }
}

/// Split comma separated list text, dropping empty elements
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_valid_flag_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap())
        .is_match(name)
        && !name.contains("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_coerced_on_finalize() {
        let spec = FlagSpec::int("level").default("3").finalize().unwrap();
        assert_eq!(spec.default_value(), &FlagValue::Int(3));
    }

    #[test]
    fn test_invalid_default_is_rejected() {
        let err = FlagSpec::int("level").default("high").finalize().unwrap_err();
        assert!(matches!(err, BuildError::InvalidDefault { .. }));
    }

    #[test]
    fn test_no_opt_default_must_be_a_valid_value() {
        let spec = FlagSpec::string("color")
            .values(["auto", "always", "never"])
            .no_opt_default("auto")
            .finalize()
            .unwrap();
        assert_eq!(spec.no_opt_value(), Some("auto"));

        let err = FlagSpec::string("color")
            .values(["auto", "never"])
            .no_opt_default("sometimes")
            .finalize()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidDefault { raw, .. } if raw == "sometimes"));

        assert!(FlagSpec::bool("force").no_opt_default("true").finalize().is_err());
    }

    #[test]
    fn test_list_default_splits_on_commas() {
        let spec = FlagSpec::list("tag").default("a, b,,c").finalize().unwrap();
        assert_eq!(
            spec.default_value().as_list().unwrap(),
            &["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_closed_value_set() {
        let spec = FlagSpec::string("format").values(["json", "yaml"]);
        assert_eq!(spec.coerce("json"), Ok(FlagValue::String("json".to_string())));
        assert_eq!(spec.coerce("xml"), Err("one of [json, yaml]".to_string()));
    }

    #[test]
    fn test_name_validation() {
        assert!(FlagSpec::bool("dry-run").finalize().is_ok());
        assert!(FlagSpec::bool("-x").finalize().is_err());
        assert!(FlagSpec::bool("a--b").finalize().is_err());
        assert!(FlagSpec::bool("with space").finalize().is_err());
        assert!(FlagSpec::bool("ok").short('1').finalize().is_err());
    }
}
