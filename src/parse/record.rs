//! The result of a successful resolution

use crate::flag::{FlagValue, ValueSource};
use crate::tree::CommandId;
use std::collections::BTreeMap;
use std::time::Duration;

/// A flag's final value within an invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFlag {
    pub value: FlagValue,
    pub source: ValueSource,
    /// How many times the flag appeared on the command line
    pub occurrences: usize,
}

/// A resolved command with every visible flag bound and the remaining
/// positional arguments. Built once per resolution and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub(crate) command: CommandId,
    pub(crate) path: Vec<String>,
    pub(crate) invoked_as: String,
    pub(crate) flags: BTreeMap<String, BoundFlag>,
    pub(crate) args: Vec<String>,
    pub(crate) deprecations: Vec<String>,
}

impl InvocationRecord {
    /// The resolved command
    pub fn command(&self) -> CommandId {
        self.command
    }

    /// Canonical names from the root to the resolved command
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The exact name or alias the resolved command was reached through
    pub fn invoked_as(&self) -> &str {
        &self.invoked_as
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Every flag in the command's effective set
    pub fn flags(&self) -> &BTreeMap<String, BoundFlag> {
        &self.flags
    }

    pub fn flag(&self, name: &str) -> Option<&BoundFlag> {
        self.flags.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name).map(|b| &b.value)
    }

    /// Whether the flag was given explicitly or through its environment key
    pub fn is_set(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .map_or(false, |b| b.source != ValueSource::Default)
    }

    pub fn source(&self, name: &str) -> Option<ValueSource> {
        self.flags.get(name).map(|b| b.source)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(FlagValue::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(FlagValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(FlagValue::as_float)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FlagValue::as_str)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.value(name).and_then(FlagValue::as_list)
    }

    pub fn get_duration(&self, name: &str) -> Option<Duration> {
        self.value(name).and_then(FlagValue::as_duration)
    }

    pub fn get_count(&self, name: &str) -> Option<u64> {
        self.value(name).and_then(FlagValue::as_count)
    }

    /// Deprecation notices for commands and flags used in this invocation
    pub fn deprecations(&self) -> &[String] {
        &self.deprecations
    }
}
