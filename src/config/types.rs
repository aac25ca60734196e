//! Tree definition types
//!
//! This module defines the data structures that represent a clitree.yml file.

use crate::flag::FlagKind;
use crate::parse::ResolverConfig;
use serde::{Deserialize, Serialize};

/// Top-level definition: the root command plus resolver settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TreeDefinition {
    /// The root command; its name is the program name
    #[serde(flatten)]
    pub root: CommandDefinition,

    /// Resolver behavior for this program
    #[serde(default)]
    pub settings: ResolverConfig,
}

/// A command definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommandDefinition {
    /// Command name (may come from the including entry when included)
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Description shown in completions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Hidden commands resolve normally but are never offered
    #[serde(default)]
    pub hidden: bool,

    /// Deprecation message; using the command logs a warning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    /// Positional values offered by completion
    #[serde(
        rename = "valid-args",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_scalars"
    )]
    pub valid_args: Vec<String>,

    /// Whether the command has a run handler. Defaults to true for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runnable: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagDefinition>,

    /// Flag groups where at most one member may be set
    #[serde(rename = "mutually-exclusive", default, skip_serializing_if = "Vec::is_empty")]
    pub mutually_exclusive: Vec<Vec<String>>,

    #[serde(rename = "one-required", default, skip_serializing_if = "Vec::is_empty")]
    pub one_required: Vec<Vec<String>>,

    #[serde(rename = "required-together", default, skip_serializing_if = "Vec::is_empty")]
    pub required_together: Vec<Vec<String>>,

    /// Pass every argument after this command through untouched
    #[serde(rename = "disable-flag-parsing", default)]
    pub disable_flag_parsing: bool,

    /// Subcommands, in completion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandDefinition>,

    /// Load this command's definition from another file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

impl CommandDefinition {
    pub fn is_runnable(&self) -> bool {
        self.runnable.unwrap_or(self.commands.is_empty())
    }
}

/// A flag definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlagDefinition {
    pub name: String,

    /// Value kind (bool, int, float, string, list, duration, count)
    #[serde(rename = "type", default)]
    pub kind: FlagKind,

    /// Shorthand letter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value; lists accept a sequence or comma separated text
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_default"
    )]
    pub default: Option<String>,

    /// Value used when the flag is given without one
    #[serde(
        rename = "no-opt-default",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_default"
    )]
    pub no_opt_default: Option<String>,

    /// Environment variable to read when the flag is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Visible to every subcommand
    #[serde(default)]
    pub persistent: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    /// Closed set of accepted values
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_scalars"
    )]
    pub values: Vec<String>,

    /// Path completion for the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<PathCompletion>,

    /// File extensions to complete; implies `complete: files`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

/// Kind of path a flag value is completed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCompletion {
    #[serde(alias = "file")]
    Files,
    #[serde(alias = "directories", alias = "dir")]
    Dirs,
}

/// Render a YAML scalar as the text a user would type
fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Custom deserializer for defaults that accepts any scalar, or a sequence
/// of scalars for list flags
fn deserialize_default<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        Value::Sequence(seq) => {
            let items = seq
                .into_iter()
                .map(|item| scalar_text(item).ok_or_else(|| D::Error::custom("list default items must be scalars")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(items.join(",")))
        }
        other => scalar_text(other)
            .map(Some)
            .ok_or_else(|| D::Error::custom("default must be a scalar or a list of scalars")),
    }
}

/// Custom deserializer for value lists that handles both single values and arrays
fn deserialize_scalars<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|item| scalar_text(item).ok_or_else(|| D::Error::custom("values must be scalars")))
            .collect(),
        other => scalar_text(other)
            .map(|s| vec![s])
            .ok_or_else(|| D::Error::custom("values must be a scalar or an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{NameNormalization, ShortValuePolicy};

    #[test]
    fn test_deserialize_simple_definition() {
        let yaml = r#"
name: app
commands:
  - name: hello
    description: Say hello
"#;
        let def: TreeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.root.name, "app");
        assert_eq!(def.root.commands.len(), 1);
        assert!(def.root.commands[0].is_runnable());
        assert!(!def.root.is_runnable());
        assert_eq!(def.settings, ResolverConfig::default());
    }

    #[test]
    fn test_deserialize_flags() {
        let yaml = r#"
name: app
flags:
  - name: port
    type: int
    short: p
    default: 8080
  - name: tags
    type: list
    default: [a, b]
  - name: level
    values: [1, 2, 3]
  - name: config
    extensions: [yml]
  - name: debug
    type: boolean
    default: true
"#;
        let def: TreeDefinition = serde_yaml::from_str(yaml).unwrap();
        let flags = &def.root.flags;
        assert_eq!(flags[0].kind, FlagKind::Int);
        assert_eq!(flags[0].short, Some('p'));
        assert_eq!(flags[0].default.as_deref(), Some("8080"));
        assert_eq!(flags[1].default.as_deref(), Some("a,b"));
        assert_eq!(flags[2].kind, FlagKind::String);
        assert_eq!(flags[2].values, vec!["1", "2", "3"]);
        assert_eq!(flags[3].extensions, vec!["yml"]);
        assert_eq!(flags[4].default.as_deref(), Some("true"));
    }

    #[test]
    fn test_deserialize_settings() {
        let yaml = r#"
name: app
settings:
  prefix-matching: true
  short-values: attached
"#;
        let def: TreeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.settings.prefix_matching);
        assert_eq!(def.settings.short_values, ShortValuePolicy::Attached);
        assert!(def.settings.bool_negation);
    }

    #[test]
    fn test_deserialize_resolver_knobs() {
        let yaml = r#"
name: app
settings:
  short-flag-grouping: false
  normalize-flag-names: underscores
  allow-unknown-flags: true
  traverse-children: true
"#;
        let def: TreeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(!def.settings.short_flag_grouping);
        assert_eq!(def.settings.normalize_flag_names, NameNormalization::Underscores);
        assert!(def.settings.allow_unknown_flags);
        assert!(def.settings.traverse_children);
    }

    #[test]
    fn test_deserialize_groups_and_no_opt_default() {
        let yaml = r#"
name: app
disable-flag-parsing: true
mutually-exclusive:
  - [json, yaml]
required-together:
  - [user, password]
flags:
  - name: color
    no-opt-default: always
  - name: level
    type: int
    no-opt-default: 3
"#;
        let def: TreeDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.root.disable_flag_parsing);
        assert_eq!(def.root.mutually_exclusive, vec![vec!["json", "yaml"]]);
        assert_eq!(def.root.required_together, vec![vec!["user", "password"]]);
        assert!(def.root.one_required.is_empty());
        assert_eq!(def.root.flags[0].no_opt_default.as_deref(), Some("always"));
        assert_eq!(def.root.flags[1].no_opt_default.as_deref(), Some("3"));
    }
}
