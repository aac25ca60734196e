//! The command tree
//!
//! The tree owns every node in a flat arena; children are listed by id and
//! each node keeps its parent's id for upward navigation. The tree is built
//! once and treated as read-only afterwards, so effective flag sets are
//! computed lazily and cached per node.

use crate::complete::{CompletionContext, CompletionFn, Prediction};
use crate::error::{BuildError, BuildResult, ParseResult};
use crate::flag::{FlagSet, FlagSpec};
use crate::parse::{InvocationRecord, Resolver};
use crate::tree::{Command, CommandId, CommandNode, FlagGroup, RunHandler};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// A finished or in-construction command hierarchy with exactly one root
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl CommandTree {
    /// Build a tree from a root command, registering its flags and
    /// subcommands recursively.
    pub fn new(root: Command) -> BuildResult<Self> {
        let mut tree = CommandTree { nodes: Vec::new() };
        tree.attach(None, root)?;
        tree.validate_shorthands(CommandId::ROOT)?;
        tree.validate_groups(CommandId::ROOT)?;
        Ok(tree)
    }

    pub fn root(&self) -> CommandId {
        CommandId::ROOT
    }

    pub fn root_node(&self) -> &CommandNode {
        &self.nodes[0]
    }

    /// Name of the root command, used as the program name
    pub fn program_name(&self) -> &str {
        &self.nodes[0].name
    }

    pub fn get(&self, id: CommandId) -> Option<&CommandNode> {
        self.nodes.get(id.index())
    }

    /// Look up a node by id.
    ///
    /// Ids are only handed out by this tree; an id from another tree panics.
    pub fn node(&self, id: CommandId) -> &CommandNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, depth-first from the root, children in declaration order
    pub fn walk(&self) -> Vec<CommandId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![CommandId::ROOT];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    /// Every node below `id` in walk order, `id` itself excluded
    pub fn descendants(&self, id: CommandId) -> Vec<CommandId> {
        let mut out = Vec::new();
        let mut stack: Vec<CommandId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.node(current).children.iter().rev().copied());
        }
        out
    }

    /// Add a command (and its subcommands) under `parent`.
    ///
    /// Fails with `DuplicateName` if any of its names collide with a sibling.
    /// On failure the tree is left unchanged.
    pub fn add_child(&mut self, parent: CommandId, command: Command) -> BuildResult<CommandId> {
        self.check_node(parent)?;
        let mark = self.nodes.len();

        let result = self
            .attach(Some(parent), command)
            .and_then(|id| self.validate_shorthands(id).map(|_| id))
            .and_then(|id| self.validate_groups(id).map(|_| id));

        if result.is_err() {
            self.nodes.truncate(mark);
            self.nodes[parent.index()]
                .children
                .retain(|c| c.index() < mark);
        }
        self.invalidate();
        result
    }

    /// Register a flag on a command.
    ///
    /// Fails with `DuplicateFlag` when the name or shorthand is taken locally,
    /// or when the shorthand would become ambiguous in any command that sees it.
    pub fn add_flag(&mut self, id: CommandId, spec: FlagSpec) -> BuildResult<()> {
        self.check_node(id)?;
        let owner = self.node(id).name.clone();
        let registered = self.nodes[id.index()].flags.register(&owner, spec)?;
        self.invalidate();

        if let Err(e) = self.validate_shorthands(id) {
            self.nodes[id.index()].flags.remove(registered.name());
            self.invalidate();
            return Err(e);
        }
        Ok(())
    }

    pub fn set_run_handler(&mut self, id: CommandId, handler: RunHandler) -> BuildResult<()> {
        self.check_node(id)?;
        self.nodes[id.index()].handler = Some(handler);
        Ok(())
    }

    pub fn parent(&self, id: CommandId) -> Option<CommandId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Ids from the root down to `id`, inclusive
    pub fn ancestry(&self, id: CommandId) -> Vec<CommandId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Canonical names from the root down to `id`
    pub fn path_names(&self, id: CommandId) -> Vec<String> {
        self.ancestry(id)
            .into_iter()
            .map(|a| self.node(a).name.clone())
            .collect()
    }

    /// Find the direct child of `parent` answering to `token` exactly
    pub fn child_named(&self, parent: CommandId, token: &str) -> Option<CommandId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|c| self.node(*c).answers_to(token))
    }

    /// Follow a path of names or aliases below the root
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<CommandId> {
        path.iter().try_fold(CommandId::ROOT, |at, token| {
            self.child_named(at, token.as_ref())
        })
    }

    /// The flags visible at `id`: its local flags over the persistent flags
    /// of its ancestors, nearer ancestors shadowing farther ones.
    pub fn effective_flags(&self, id: CommandId) -> &FlagSet {
        self.node(id)
            .effective
            .get_or_init(|| self.compute_effective(id))
    }

    /// Flag groups that apply at `id`, root first
    pub fn flag_groups(&self, id: CommandId) -> Vec<&FlagGroup> {
        self.ancestry(id)
            .into_iter()
            .flat_map(|a| self.node(a).groups.iter())
            .collect()
    }

    /// Value completion callback for `flag`, searched from `id` upwards
    pub fn flag_completion(&self, id: CommandId, flag: &str) -> Option<&CompletionFn> {
        self.ancestry(id)
            .into_iter()
            .rev()
            .find_map(|a| self.node(a).flag_completion(flag))
    }

    /// Resolve `argv` (without the program name) using the default
    /// configuration and the process environment.
    pub fn resolve<S: AsRef<str>>(&self, argv: &[S]) -> ParseResult<InvocationRecord> {
        Resolver::new(self).resolve(argv)
    }

    /// Predict completion candidates using the default configuration
    pub fn predict(&self, context: &CompletionContext) -> Prediction {
        Resolver::new(self).predict(context)
    }

    fn compute_effective(&self, id: CommandId) -> FlagSet {
        let chain = self.ancestry(id);
        let mut set = FlagSet::default();
        if let Some((own, ancestors)) = chain.split_last() {
            for ancestor in ancestors {
                for spec in self.node(*ancestor).flags.persistent() {
                    set.overlay(*ancestor, spec);
                }
            }
            for spec in self.node(*own).flags.iter() {
                set.overlay(*own, spec);
            }
        }
        set
    }

    fn attach(&mut self, parent: Option<CommandId>, command: Command) -> BuildResult<CommandId> {
        self.check_names(parent, &command)?;

        let id = CommandId::from_index(self.nodes.len());
        self.nodes.push(CommandNode::from_builder(id, parent, &command));
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        debug!(command = %command.name, id = %id, "registered command");

        let Command {
            name,
            flags,
            subcommands,
            ..
        } = command;
        for spec in flags {
            self.nodes[id.index()].flags.register(&name, spec)?;
        }
        for sub in subcommands {
            self.attach(Some(id), sub)?;
        }
        Ok(id)
    }

    fn check_names(&self, parent: Option<CommandId>, command: &Command) -> BuildResult<()> {
        let names: Vec<&String> = std::iter::once(&command.name)
            .chain(command.aliases.iter())
            .collect();

        for name in &names {
            if !is_valid_command_name(name) {
                return Err(BuildError::InvalidName {
                    what: "command",
                    name: name.to_string(),
                });
            }
        }

        let parent_name = parent
            .map(|p| self.node(p).name.clone())
            .unwrap_or_default();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(BuildError::DuplicateName {
                    parent: parent_name,
                    name: name.to_string(),
                });
            }
        }

        if let Some(parent) = parent {
            for sibling in &self.node(parent).children {
                let sibling = self.node(*sibling);
                if let Some(name) = names.iter().find(|n| sibling.answers_to(n)) {
                    return Err(BuildError::DuplicateName {
                        parent: parent_name,
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check shorthand uniqueness in the effective set of `id` and every
    /// descendant
    fn validate_shorthands(&self, id: CommandId) -> BuildResult<()> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let set = self.compute_effective(current);
            if let Some(c) = set.shorthand_conflict() {
                return Err(BuildError::DuplicateFlag {
                    command: self.node(current).name.clone(),
                    flag: format!("-{}", c),
                });
            }
            stack.extend(self.node(current).children.iter().copied());
        }
        Ok(())
    }

    /// Check that every flag group below `id` names flags its command sees
    fn validate_groups(&self, id: CommandId) -> BuildResult<()> {
        for current in std::iter::once(id).chain(self.descendants(id)) {
            let node = self.node(current);
            if node.groups.is_empty() {
                continue;
            }
            let visible = self.compute_effective(current);
            for group in &node.groups {
                if let Some(flag) = group.flags.iter().find(|f| !visible.contains(f)) {
                    return Err(BuildError::UnknownGroupFlag {
                        command: node.name.clone(),
                        flag: flag.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_node(&self, id: CommandId) -> BuildResult<()> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(BuildError::UnknownNode(id.index()))
        }
    }

    fn invalidate(&mut self) {
        for node in &mut self.nodes {
            node.effective = OnceLock::new();
        }
    }
}

fn is_valid_command_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:+-]*$").unwrap())
        .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FlagKind;

    fn sample() -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("verbose").short('v').persistent())
                .flag(FlagSpec::string("config").short('c'))
                .subcommand(
                    Command::new("server")
                        .alias("srv")
                        .flag(FlagSpec::int("port").short('p'))
                        .subcommand(Command::new("start")),
                )
                .subcommand(Command::new("status")),
        )
        .unwrap()
    }

    #[test]
    fn test_build_links_parents_and_children() {
        let tree = sample();
        assert_eq!(tree.len(), 4);
        let server = tree.find(&["server"]).unwrap();
        let start = tree.find(&["srv", "start"]).unwrap();
        assert_eq!(tree.parent(start), Some(server));
        assert_eq!(tree.parent(server), Some(tree.root()));
        assert_eq!(tree.path_names(start), vec!["app", "server", "start"]);
    }

    #[test]
    fn test_duplicate_sibling_name_is_rejected() {
        let mut tree = sample();
        let err = tree
            .add_child(tree.root(), Command::new("srv"))
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateName {
                parent: "app".to_string(),
                name: "srv".to_string(),
            }
        );
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_alias_equal_to_own_name_is_rejected() {
        let err = CommandTree::new(Command::new("app").subcommand(Command::new("x").alias("x")))
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateName { .. }));
    }

    #[test]
    fn test_effective_flags_merge_persistent() {
        let tree = sample();
        let server = tree.find(&["server"]).unwrap();
        let flags = tree.effective_flags(server);
        let names: Vec<&str> = flags.names().collect();
        assert_eq!(names, vec!["port", "verbose"]);
        assert_eq!(flags.get("verbose").unwrap().owner, tree.root());
        assert!(flags.get("config").is_none());
    }

    #[test]
    fn test_local_flag_shadows_inherited() {
        let mut tree = sample();
        let status = tree.find(&["status"]).unwrap();
        tree.add_flag(status, FlagSpec::count("verbose")).unwrap();
        let flags = tree.effective_flags(status);
        let verbose = flags.get("verbose").unwrap();
        assert_eq!(verbose.owner, status);
        assert_eq!(verbose.spec.kind(), FlagKind::Count);
    }

    #[test]
    fn test_inherited_shorthand_collision_is_rejected() {
        let mut tree = sample();
        let server = tree.find(&["server"]).unwrap();
        let err = tree
            .add_flag(server, FlagSpec::bool("validate").short('v'))
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateFlag { flag, .. } if flag == "-v"));
        assert!(tree.effective_flags(server).get("validate").is_none());
    }

    #[test]
    fn test_persistent_flag_checked_against_descendants() {
        let mut tree = sample();
        let err = tree
            .add_flag(tree.root(), FlagSpec::bool("pretty").short('p').persistent())
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateFlag { .. }));
        assert!(tree.node(tree.root()).local_flags().get("pretty").is_none());
    }

    #[test]
    fn test_cache_is_refreshed_after_mutation() {
        let mut tree = sample();
        let status = tree.find(&["status"]).unwrap();
        assert_eq!(tree.effective_flags(status).len(), 1);
        tree.add_flag(tree.root(), FlagSpec::string("output").persistent())
            .unwrap();
        assert_eq!(tree.effective_flags(status).len(), 2);
    }

    #[test]
    fn test_unknown_node_is_reported() {
        let mut tree = sample();
        let bogus = CommandId::from_index(99);
        assert_eq!(
            tree.add_flag(bogus, FlagSpec::bool("x")),
            Err(BuildError::UnknownNode(99))
        );
    }

    #[test]
    fn test_group_members_must_be_visible() {
        let err = CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("json"))
                .subcommand(Command::new("list").mutually_exclusive(["json", "yaml"])),
        )
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownGroupFlag {
                command: "list".to_string(),
                flag: "json".to_string(),
            }
        );

        let tree = CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("json").persistent())
                .flag(FlagSpec::bool("yaml").persistent())
                .subcommand(Command::new("list").mutually_exclusive(["json", "yaml"])),
        )
        .unwrap();
        let list = tree.find(&["list"]).unwrap();
        assert_eq!(tree.flag_groups(list).len(), 1);
        assert!(tree.flag_groups(tree.root()).is_empty());
    }

    #[test]
    fn test_descendants_exclude_start() {
        let tree = sample();
        let names: Vec<&str> = tree
            .descendants(tree.root())
            .into_iter()
            .map(|id| tree.node(id).name())
            .collect();
        assert_eq!(names, vec!["server", "start", "status"]);
        let start = tree.find(&["server", "start"]).unwrap();
        assert!(tree.descendants(start).is_empty());
    }

    #[test]
    fn test_walk_is_depth_first() {
        let tree = sample();
        let names: Vec<&str> = tree.walk().into_iter().map(|id| tree.node(id).name()).collect();
        assert_eq!(names, vec!["app", "server", "start", "status"]);
    }
}
