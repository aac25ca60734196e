//! Command nodes and the command builder

use crate::complete::{CompletionArgs, CompletionFn, Prediction};
use crate::flag::{FlagRegistry, FlagSet, FlagSpec};
use crate::parse::InvocationRecord;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Opaque handler attached to a command.
///
/// Resolution never calls it; it is handed to the host together with the
/// invocation record.
pub type RunHandler = Arc<dyn Fn(&InvocationRecord) -> anyhow::Result<()> + Send + Sync>;

/// Index of a node inside its [`CommandTree`](crate::tree::CommandTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(usize);

impl CommandId {
    pub const ROOT: CommandId = CommandId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        CommandId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Constraint a flag group places on its members
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupRule {
    /// At most one member may be set
    MutuallyExclusive,
    /// At least one member must be set
    OneRequired,
    /// Either every member is set or none is
    RequiredTogether,
}

/// Named flags checked together after binding.
///
/// A flag counts as set when it came from the command line or the
/// environment. Groups declared on a command apply to it and to every
/// descendant that can still see all of the members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagGroup {
    pub rule: GroupRule,
    pub flags: Vec<String>,
}

/// Builder for a command and, recursively, its subcommands
#[derive(Clone)]
pub struct Command {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) deprecated: Option<String>,
    pub(crate) valid_args: Vec<String>,
    pub(crate) valid_args_fn: Option<CompletionFn>,
    pub(crate) flag_completions: BTreeMap<String, CompletionFn>,
    pub(crate) groups: Vec<FlagGroup>,
    pub(crate) raw_args: bool,
    pub(crate) flags: Vec<FlagSpec>,
    pub(crate) subcommands: Vec<Command>,
    pub(crate) handler: Option<RunHandler>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            hidden: false,
            deprecated: None,
            valid_args: Vec::new(),
            valid_args_fn: None,
            flag_completions: BTreeMap::new(),
            groups: Vec::new(),
            raw_args: false,
            flags: Vec::new(),
            subcommands: Vec::new(),
            handler: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Hide from completion candidates; the command still resolves
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    /// Static positional values offered during completion
    pub fn valid_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Compute positional candidates at completion time. Replaces the
    /// static `valid_args` list; candidates are filtered by the typed prefix.
    pub fn valid_args_fn<F>(mut self, complete: F) -> Self
    where
        F: Fn(&CompletionArgs<'_>) -> Prediction + Send + Sync + 'static,
    {
        self.valid_args_fn = Some(Arc::new(complete));
        self
    }

    /// Compute value candidates for a flag visible at this command or any
    /// descendant. The nearest registration wins.
    pub fn flag_completion<F>(mut self, flag: impl Into<String>, complete: F) -> Self
    where
        F: Fn(&CompletionArgs<'_>) -> Prediction + Send + Sync + 'static,
    {
        self.flag_completions.insert(flag.into(), Arc::new(complete));
        self
    }

    pub fn mutually_exclusive<I, S>(self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group(GroupRule::MutuallyExclusive, flags)
    }

    pub fn one_required<I, S>(self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group(GroupRule::OneRequired, flags)
    }

    pub fn required_together<I, S>(self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group(GroupRule::RequiredTogether, flags)
    }

    pub fn group<I, S>(mut self, rule: GroupRule, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(FlagGroup {
            rule,
            flags: flags.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Stop flag parsing once this command is reached: every later token,
    /// `--` included, is kept verbatim as a positional argument.
    pub fn disable_flag_parsing(mut self, disabled: bool) -> Self {
        self.raw_args = disabled;
        self
    }

    pub fn flag(mut self, spec: FlagSpec) -> Self {
        self.flags.push(spec);
        self
    }

    pub fn subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    pub fn run<F>(mut self, handler: F) -> Self
    where
        F: Fn(&InvocationRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("flags", &self.flags.len())
            .field("groups", &self.groups)
            .field("subcommands", &self.subcommands)
            .finish()
    }
}

/// A command as stored in the tree
pub struct CommandNode {
    pub(crate) id: CommandId,
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) deprecated: Option<String>,
    pub(crate) valid_args: Vec<String>,
    pub(crate) valid_args_fn: Option<CompletionFn>,
    pub(crate) flag_completions: BTreeMap<String, CompletionFn>,
    pub(crate) groups: Vec<FlagGroup>,
    pub(crate) raw_args: bool,
    pub(crate) parent: Option<CommandId>,
    pub(crate) children: Vec<CommandId>,
    pub(crate) flags: FlagRegistry,
    pub(crate) handler: Option<RunHandler>,
    pub(crate) effective: OnceLock<FlagSet>,
}

impl CommandNode {
    pub(crate) fn from_builder(id: CommandId, parent: Option<CommandId>, command: &Command) -> Self {
        CommandNode {
            id,
            name: command.name.clone(),
            aliases: command.aliases.clone(),
            description: command.description.clone(),
            hidden: command.hidden,
            deprecated: command.deprecated.clone(),
            valid_args: command.valid_args.clone(),
            valid_args_fn: command.valid_args_fn.clone(),
            flag_completions: command.flag_completions.clone(),
            groups: command.groups.clone(),
            raw_args: command.raw_args,
            parent,
            children: Vec::new(),
            flags: FlagRegistry::new(),
            handler: command.handler.clone(),
            effective: OnceLock::new(),
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The name followed by every alias
    pub fn invocation_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `token` is this command's name or one of its aliases
    pub fn answers_to(&self, token: &str) -> bool {
        self.invocation_names().any(|n| n == token)
    }

    pub fn about(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn valid_args(&self) -> &[String] {
        &self.valid_args
    }

    pub fn valid_args_fn(&self) -> Option<&CompletionFn> {
        self.valid_args_fn.as_ref()
    }

    /// Completion callback registered on this command for `flag`
    pub fn flag_completion(&self, flag: &str) -> Option<&CompletionFn> {
        self.flag_completions.get(flag)
    }

    pub fn flag_groups(&self) -> &[FlagGroup] {
        &self.groups
    }

    pub fn parses_flags(&self) -> bool {
        !self.raw_args
    }

    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    pub fn children(&self) -> &[CommandId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Flags declared on this command
    pub fn local_flags(&self) -> &FlagRegistry {
        &self.flags
    }

    pub fn run_handler(&self) -> Option<&RunHandler> {
        self.handler.as_ref()
    }

    pub fn is_runnable(&self) -> bool {
        self.handler.is_some()
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("flags", &self.flags)
            .field("groups", &self.groups)
            .field("runnable", &self.handler.is_some())
            .finish()
    }
}
