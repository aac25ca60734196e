//! Declared flag value kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type a flag's raw text is coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    #[serde(alias = "boolean")]
    Bool,

    #[serde(alias = "integer")]
    Int,

    Float,

    #[default]
    #[serde(alias = "str")]
    String,

    /// Repeatable: every occurrence appends one element
    #[serde(alias = "strings", alias = "string-list")]
    List,

    Duration,

    /// Repeatable: every bare occurrence increments by one
    Count,
}

impl FlagKind {
    /// Whether the flag consumes a value token when written without `=`
    pub fn takes_value(self) -> bool {
        !matches!(self, FlagKind::Bool | FlagKind::Count)
    }

    /// Whether the flag may be bound more than once meaningfully
    pub fn is_repeatable(self) -> bool {
        matches!(self, FlagKind::List | FlagKind::Count)
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlagKind::Bool => "boolean",
            FlagKind::Int => "integer",
            FlagKind::Float => "float",
            FlagKind::String => "string",
            FlagKind::List => "string list",
            FlagKind::Duration => "duration",
            FlagKind::Count => "count",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_taking_kinds() {
        assert!(!FlagKind::Bool.takes_value());
        assert!(!FlagKind::Count.takes_value());
        assert!(FlagKind::Int.takes_value());
        assert!(FlagKind::List.takes_value());
        assert!(FlagKind::Duration.takes_value());
    }

    #[test]
    fn test_kind_aliases_deserialize() {
        let kinds: Vec<FlagKind> =
            serde_yaml::from_str("[bool, boolean, int, integer, str, strings, duration, count]")
                .unwrap();
        assert_eq!(
            kinds,
            vec![
                FlagKind::Bool,
                FlagKind::Bool,
                FlagKind::Int,
                FlagKind::Int,
                FlagKind::String,
                FlagKind::List,
                FlagKind::Duration,
                FlagKind::Count,
            ]
        );
    }
}
