//! Error types for clitree

use crate::flag::FlagKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for clitree operations
pub type Result<T> = std::result::Result<T, ClitreeError>;

/// Main error type for clitree
#[derive(Error, Debug)]
pub enum ClitreeError {
    /// Tree construction errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Command-line resolution errors
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Tree definition file errors
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ClitreeError {
    /// Process exit code conventionally associated with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ClitreeError::Parse(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// Errors raised while registering commands and flags.
///
/// These are reported at registration time, before any user input is seen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("Command '{parent}' already has a child named '{name}'")]
    DuplicateName { parent: String, name: String },

    #[error("Flag '{flag}' is already defined on command '{command}'")]
    DuplicateFlag { command: String, flag: String },

    #[error("Invalid {what} name '{name}'")]
    InvalidName { what: &'static str, name: String },

    #[error("Default value '{raw}' for flag '{flag}' is not a valid {expected}")]
    InvalidDefault {
        flag: String,
        raw: String,
        expected: String,
    },

    #[error("Command id {0} does not belong to this tree")]
    UnknownNode(usize),

    #[error("Flag group on command '{command}' names '{flag}', which the command cannot see")]
    UnknownGroupFlag { command: String, flag: String },
}

/// Errors produced while resolving a token stream against a command tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command \"{name}\"{}", did_you_mean(.suggestions))]
    UnknownCommand {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("ambiguous command \"{prefix}\" could be: {}", .candidates.join(", "))]
    AmbiguousCommand {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("unknown flag: {name}{}", did_you_mean(.suggestions))]
    UnknownFlag {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("flag needs an argument: --{0}")]
    MissingValue(String),

    #[error("invalid argument \"{raw}\" for --{flag}: expected {expected}")]
    InvalidValue {
        flag: String,
        raw: String,
        expected: String,
    },

    #[error("required flag \"{0}\" not set")]
    MissingRequired(String),

    #[error("flag -{flag} in \"-{cluster}\" takes a value and must be last in the group")]
    MisplacedShorthand { cluster: String, flag: char },

    #[error("flags are mutually exclusive: {}", .0.join(", "))]
    MutuallyExclusive(Vec<String>),

    #[error("at least one of the flags in the group is required: {}", .0.join(", "))]
    OneRequired(Vec<String>),

    #[error("flags must be set together: {}", .0.join(", "))]
    RequiredTogether(Vec<String>),
}

impl ParseError {
    /// Usage errors exit with status 2
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Build an `InvalidValue` error for a flag of the given kind
    pub fn invalid_value(flag: &str, raw: &str, kind: FlagKind) -> Self {
        ParseError::InvalidValue {
            flag: flag.to_string(),
            raw: raw.to_string(),
            expected: kind.to_string(),
        }
    }
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("\n\nDid you mean this?\n\t{}", suggestions.join("\n\t"))
    }
}

/// Errors in declarative tree definition files
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to find definition file (searched: {0})")]
    NotFound(String),

    #[error("Invalid definition: {0}")]
    Invalid(String),

    #[error("Failed to include file '{path}': {error}")]
    IncludeFile { path: PathBuf, error: String },

    #[error("Include cycle detected: {0}")]
    IncludeCycle(String),
}

/// Specialized result type for build operations
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Specialized result type for resolution
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Specialized result type for definition files
pub type DefinitionResult<T> = std::result::Result<T, DefinitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_suggestions() {
        let err = ParseError::UnknownCommand {
            name: "stat".to_string(),
            suggestions: vec!["start".to_string(), "status".to_string()],
        };
        let text = err.to_string();
        assert!(text.starts_with("unknown command \"stat\""));
        assert!(text.contains("\tstart\n\tstatus"));
    }

    #[test]
    fn test_unknown_flag_without_suggestions() {
        let err = ParseError::UnknownFlag {
            name: "--bogus".to_string(),
            suggestions: vec![],
        };
        assert_eq!(err.to_string(), "unknown flag: --bogus");
    }

    #[test]
    fn test_group_errors_list_every_member() {
        let err = ParseError::MutuallyExclusive(vec!["--json".to_string(), "--yaml".to_string()]);
        assert_eq!(err.to_string(), "flags are mutually exclusive: --json, --yaml");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_parse_errors_exit_with_usage_code() {
        let err: ClitreeError = ParseError::MissingRequired("token".to_string()).into();
        assert_eq!(err.exit_code(), 2);

        let err: ClitreeError = DefinitionError::Invalid("x".to_string()).into();
        assert_eq!(err.exit_code(), 1);
    }
}
