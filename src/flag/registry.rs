//! Per-command flag registries and effective flag sets

use crate::error::{BuildError, BuildResult};
use crate::flag::FlagSpec;
use crate::tree::CommandId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Flags declared directly on one command
#[derive(Debug, Clone, Default)]
pub struct FlagRegistry {
    flags: Vec<Arc<FlagSpec>>,
}

impl FlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flag declared on the command named `owner`.
    ///
    /// Fails if the long name or the shorthand is already taken locally.
    pub fn register(&mut self, owner: &str, spec: FlagSpec) -> BuildResult<Arc<FlagSpec>> {
        let spec = spec.finalize()?;

        if self.get(spec.name()).is_some() {
            return Err(BuildError::DuplicateFlag {
                command: owner.to_string(),
                flag: format!("--{}", spec.name()),
            });
        }
        if let Some(c) = spec.shorthand() {
            if self.by_shorthand(c).is_some() {
                return Err(BuildError::DuplicateFlag {
                    command: owner.to_string(),
                    flag: format!("-{}", c),
                });
            }
        }

        let spec = Arc::new(spec);
        self.flags.push(Arc::clone(&spec));
        Ok(spec)
    }

    /// Remove a flag by name, returning it if present
    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<FlagSpec>> {
        let index = self.flags.iter().position(|f| f.name() == name)?;
        Some(self.flags.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FlagSpec>> {
        self.flags.iter().find(|f| f.name() == name)
    }

    pub fn by_shorthand(&self, c: char) -> Option<&Arc<FlagSpec>> {
        self.flags.iter().find(|f| f.shorthand() == Some(c))
    }

    /// Flags in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FlagSpec>> {
        self.flags.iter()
    }

    /// Flags inherited by descendant commands
    pub fn persistent(&self) -> impl Iterator<Item = &Arc<FlagSpec>> {
        self.flags.iter().filter(|f| f.is_persistent())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// A flag together with the command that declared it
#[derive(Debug, Clone)]
pub struct ScopedFlag {
    pub owner: CommandId,
    pub spec: Arc<FlagSpec>,
}

/// The flags visible at one command: local declarations over inherited
/// persistent ones, local winning on name collisions.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: BTreeMap<String, ScopedFlag>,
    shorthands: BTreeMap<char, String>,
}

impl FlagSet {
    /// Insert a flag, shadowing any flag of the same name
    pub(crate) fn overlay(&mut self, owner: CommandId, spec: &Arc<FlagSpec>) {
        if let Some(previous) = self.flags.get(spec.name()) {
            if let Some(c) = previous.spec.shorthand() {
                if self.shorthands.get(&c).map(String::as_str) == Some(spec.name()) {
                    self.shorthands.remove(&c);
                }
            }
        }
        if let Some(c) = spec.shorthand() {
            self.shorthands.insert(c, spec.name().to_string());
        }
        self.flags.insert(
            spec.name().to_string(),
            ScopedFlag {
                owner,
                spec: Arc::clone(spec),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ScopedFlag> {
        self.flags.get(name)
    }

    pub fn by_shorthand(&self, c: char) -> Option<&ScopedFlag> {
        self.shorthands.get(&c).and_then(|name| self.flags.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Flags sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ScopedFlag> {
        self.flags.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// First shorthand shared by two distinct flags in this set, if any
    pub(crate) fn shorthand_conflict(&self) -> Option<char> {
        let mut seen = BTreeMap::new();
        for scoped in self.flags.values() {
            if let Some(c) = scoped.spec.shorthand() {
                if seen.insert(c, scoped.spec.name()).is_some() {
                    return Some(c);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicate_name() {
        let mut registry = FlagRegistry::new();
        registry.register("app", FlagSpec::bool("verbose")).unwrap();
        let err = registry.register("app", FlagSpec::int("verbose")).unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateFlag {
                command: "app".to_string(),
                flag: "--verbose".to_string(),
            }
        );
    }

    #[test]
    fn test_register_rejects_duplicate_shorthand() {
        let mut registry = FlagRegistry::new();
        registry
            .register("app", FlagSpec::bool("verbose").short('v'))
            .unwrap();
        let err = registry
            .register("app", FlagSpec::bool("version").short('v'))
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateFlag { flag, .. } if flag == "-v"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overlay_shadows_by_name() {
        let root = CommandId::ROOT;
        let child = CommandId::from_index(1);
        let inherited = Arc::new(FlagSpec::int("level").short('l'));
        let local = Arc::new(FlagSpec::string("level"));

        let mut set = FlagSet::default();
        set.overlay(root, &inherited);
        set.overlay(child, &local);

        let level = set.get("level").unwrap();
        assert_eq!(level.owner, child);
        assert!(set.by_shorthand('l').is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_shorthand_conflict_detection() {
        let mut set = FlagSet::default();
        set.overlay(CommandId::ROOT, &Arc::new(FlagSpec::bool("all").short('a')));
        assert_eq!(set.shorthand_conflict(), None);
        set.overlay(CommandId::ROOT, &Arc::new(FlagSpec::bool("append").short('a')));
        assert_eq!(set.shorthand_conflict(), Some('a'));
    }
}
