//! Resolver and binder
//!
//! Walks a token stream down the command tree, binding flags against the
//! effective flag set of whichever command has been reached. The same
//! [`Scanner`] drives both resolution and completion prediction; prediction
//! simply stops before [`Scanner::finish`] and inspects the scan state.

use crate::error::{ParseError, ParseResult};
use crate::flag::{parse_bool, split_list, FlagKind, FlagSpec, FlagValue, ScopedFlag, ValueSource};
use crate::parse::{lex, BoundFlag, InvocationRecord, Token};
use crate::tree::{CommandId, CommandTree, GroupRule};
use crate::utils::suggest;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// How a value-taking shorthand may appear inside a cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortValuePolicy {
    /// Only the last character of a cluster may take a value; `-vo out`
    /// is fine, `-ov out` fails with `MisplacedShorthand`.
    #[default]
    FinalOnly,
    /// A value-taking shorthand may follow booleans anywhere in a cluster,
    /// and the rest of the cluster becomes its value: `-vofile.txt`.
    Attached,
}

/// How a typed long flag name is matched against declared names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameNormalization {
    #[default]
    Exact,
    /// `_` and `-` are interchangeable, so `--dry_run` is `--dry-run`
    Underscores,
    /// As `Underscores`, ignoring ASCII case
    Loose,
}

impl NameNormalization {
    pub fn normalize(self, name: &str) -> String {
        match self {
            NameNormalization::Exact => name.to_string(),
            NameNormalization::Underscores => name.replace('_', "-"),
            NameNormalization::Loose => name.replace('_', "-").to_ascii_lowercase(),
        }
    }
}

/// Resolver behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Accept a unique prefix of a child command name
    pub prefix_matching: bool,

    pub short_values: ShortValuePolicy,

    /// Read `-abc` as `-a -b -c`. When off, a cluster of more than one
    /// letter is an unknown flag.
    pub short_flag_grouping: bool,

    /// Accept `--no-<name>` for boolean flags
    pub bool_negation: bool,

    pub normalize_flag_names: NameNormalization,

    /// Skip undeclared flags instead of failing. A bare unknown flag
    /// swallows the next argument unless that one looks like a flag.
    pub allow_unknown_flags: bool,

    /// Accept flags declared below the current command ahead of the
    /// subcommand name. They bind once the scan reaches a command that
    /// sees them.
    pub traverse_children: bool,

    /// Attach "did you mean" lists to unknown command and flag errors
    pub suggestions: bool,

    /// Maximum edit distance for suggestions
    pub suggestion_distance: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            prefix_matching: false,
            short_values: ShortValuePolicy::FinalOnly,
            short_flag_grouping: true,
            bool_negation: true,
            normalize_flag_names: NameNormalization::Exact,
            allow_unknown_flags: false,
            traverse_children: false,
            suggestions: true,
            suggestion_distance: 2,
        }
    }
}

impl ResolverConfig {
    pub fn prefix_matching(mut self, enabled: bool) -> Self {
        self.prefix_matching = enabled;
        self
    }

    pub fn short_values(mut self, policy: ShortValuePolicy) -> Self {
        self.short_values = policy;
        self
    }

    pub fn short_flag_grouping(mut self, enabled: bool) -> Self {
        self.short_flag_grouping = enabled;
        self
    }

    pub fn bool_negation(mut self, enabled: bool) -> Self {
        self.bool_negation = enabled;
        self
    }

    pub fn normalize_flag_names(mut self, style: NameNormalization) -> Self {
        self.normalize_flag_names = style;
        self
    }

    pub fn allow_unknown_flags(mut self, enabled: bool) -> Self {
        self.allow_unknown_flags = enabled;
        self
    }

    pub fn traverse_children(mut self, enabled: bool) -> Self {
        self.traverse_children = enabled;
        self
    }

    pub fn suggestions(mut self, enabled: bool) -> Self {
        self.suggestions = enabled;
        self
    }

    pub fn suggestion_distance(mut self, distance: usize) -> Self {
        self.suggestion_distance = distance;
        self
    }
}

/// Source of environment variables for flag fallback keys
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

static PROCESS_ENV: ProcessEnv = ProcessEnv;

/// Resolves argument lists against one command tree.
///
/// A resolver holds no per-call state; every call scans with its own
/// bindings, so one value can serve any number of calls.
pub struct Resolver<'a> {
    tree: &'a CommandTree,
    config: ResolverConfig,
    env: &'a dyn EnvSource,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a CommandTree) -> Self {
        Resolver {
            tree,
            config: ResolverConfig::default(),
            env: &PROCESS_ENV,
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, env: &'a dyn EnvSource) -> Self {
        self.env = env;
        self
    }

    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Lex and resolve an argument list (without the program name)
    pub fn resolve<S: AsRef<str>>(&self, argv: &[S]) -> ParseResult<InvocationRecord> {
        self.resolve_tokens(&lex(argv))
    }

    pub fn resolve_tokens(&self, tokens: &[Token]) -> ParseResult<InvocationRecord> {
        let mut scanner = self.scanner();
        for token in tokens {
            scanner.feed(token)?;
        }
        scanner.finish()
    }

    /// The deepest command `argv` reaches, scanning up to the first token
    /// that fails. Used to pick the usage text shown with an error.
    pub fn reached<S: AsRef<str>>(&self, argv: &[S]) -> CommandId {
        let mut scanner = self.scanner();
        for token in lex(argv) {
            if scanner.feed(&token).is_err() {
                break;
            }
        }
        scanner.current
    }

    pub(crate) fn scanner(&self) -> Scanner<'_> {
        Scanner::new(self.tree, &self.config, self.env)
    }
}

/// Where the scan currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// At the root, nothing matched yet
    Root,
    /// Below the root, still matching command names
    InPath,
    /// Command path fixed; positionals go to the reached command
    Positionals,
    /// After `--`
    AfterSeparator,
    /// The previous token was a flag that still needs its value
    AwaitingFlagValue,
}

/// A flag's value during a scan, with every raw occurrence kept so the
/// binding can be replayed against a shadowing definition on descent
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) owner: CommandId,
    pub(crate) spec: Arc<FlagSpec>,
    pub(crate) value: FlagValue,
    pub(crate) source: ValueSource,
    pub(crate) occurrences: Vec<Option<String>>,
}

impl Binding {
    fn from_default(scoped: &ScopedFlag) -> Self {
        Binding {
            owner: scoped.owner,
            spec: Arc::clone(&scoped.spec),
            value: scoped.spec.default_value().clone(),
            source: ValueSource::Default,
            occurrences: Vec::new(),
        }
    }

    pub(crate) fn is_explicit(&self) -> bool {
        self.source == ValueSource::CommandLine
    }

    /// Record one command-line occurrence. `None` is a bare occurrence.
    fn apply(&mut self, raw: Option<&str>) -> ParseResult<()> {
        let spec = &self.spec;
        let value = match (spec.kind(), raw) {
            (FlagKind::Bool, None) => FlagValue::Bool(true),
            (FlagKind::Count, None) => {
                FlagValue::Count(self.value.as_count().unwrap_or(0).saturating_add(1))
            }
            (_, None) => return Err(ParseError::MissingValue(spec.name().to_string())),
            (kind, Some(raw)) => {
                let coerced = spec.coerce(raw).map_err(|expected| ParseError::InvalidValue {
                    flag: spec.name().to_string(),
                    raw: raw.to_string(),
                    expected,
                })?;
                match coerced {
                    // later occurrences append; the first one replaces the default
                    FlagValue::List(items) if kind == FlagKind::List && self.is_explicit() => {
                        let mut all = self.value.as_list().map(<[String]>::to_vec).unwrap_or_default();
                        all.extend(items);
                        FlagValue::List(all)
                    }
                    other => other,
                }
            }
        };
        debug!(flag = %spec.name(), value = %value, "bound flag");
        self.value = value;
        self.source = ValueSource::CommandLine;
        self.occurrences.push(raw.map(str::to_string));
        Ok(())
    }

    fn to_bound(&self) -> BoundFlag {
        BoundFlag {
            value: self.value.clone(),
            source: self.source,
            occurrences: self.occurrences.len(),
        }
    }
}

/// A flag still waiting for its value
#[derive(Debug, Clone)]
enum Pending {
    Flag(String),
    /// Declared below the current command; the value belongs to the last
    /// held occurrence
    Held(Arc<FlagSpec>),
    /// An ignored unknown flag that may swallow one positional
    Unknown,
}

/// A flag occurrence waiting for a command that declares it
#[derive(Debug, Clone)]
struct Held {
    typed: String,
    name: String,
    raw: Option<String>,
}

/// Per-call scan state shared by resolution and prediction
pub(crate) struct Scanner<'s> {
    tree: &'s CommandTree,
    config: &'s ResolverConfig,
    env: &'s dyn EnvSource,
    pub(crate) current: CommandId,
    invoked_as: String,
    phase: ScanState,
    pub(crate) bindings: BTreeMap<String, Binding>,
    pub(crate) args: Vec<String>,
    deprecations: Vec<String>,
    pending: Option<Pending>,
    held: Vec<Held>,
    unmatched: Option<String>,
    verbatim: bool,
}

impl<'s> Scanner<'s> {
    fn new(tree: &'s CommandTree, config: &'s ResolverConfig, env: &'s dyn EnvSource) -> Self {
        let root = tree.root();
        let bindings = tree
            .effective_flags(root)
            .iter()
            .map(|scoped| (scoped.spec.name().to_string(), Binding::from_default(scoped)))
            .collect();
        Scanner {
            tree,
            config,
            env,
            current: root,
            invoked_as: tree.program_name().to_string(),
            phase: ScanState::Root,
            bindings,
            args: Vec::new(),
            deprecations: Vec::new(),
            pending: None,
            held: Vec::new(),
            unmatched: None,
            verbatim: !tree.node(root).parses_flags(),
        }
    }

    pub(crate) fn state(&self) -> ScanState {
        if self.pending.is_some() {
            ScanState::AwaitingFlagValue
        } else {
            self.phase
        }
    }

    pub(crate) fn tree(&self) -> &'s CommandTree {
        self.tree
    }

    /// The definition of the flag waiting for a value, if it is a known one
    pub(crate) fn pending_spec(&self) -> Option<Arc<FlagSpec>> {
        self.pending.as_ref().and_then(|p| self.spec_of(p))
    }

    /// False once a command that disables flag parsing has been reached
    pub(crate) fn parses_flags(&self) -> bool {
        !self.verbatim
    }

    /// The visible flag a typed long name refers to
    pub(crate) fn visible_flag(&self, typed: &str) -> Option<Arc<FlagSpec>> {
        self.lookup(typed)
            .and_then(|name| self.bindings.get(&name))
            .map(|b| Arc::clone(&b.spec))
    }

    pub(crate) fn bound_flags(&self) -> BTreeMap<String, BoundFlag> {
        self.bindings
            .iter()
            .map(|(name, b)| (name.clone(), b.to_bound()))
            .collect()
    }

    pub(crate) fn feed(&mut self, token: &Token) -> ParseResult<()> {
        trace!(token = %token, state = ?self.state(), "scanning token");

        if let Some(pending) = self.pending.take() {
            return self.feed_pending(pending, token);
        }

        if self.phase == ScanState::AfterSeparator {
            self.args.push(token.to_string());
            return Ok(());
        }

        if self.verbatim {
            return match token {
                Token::Positional(text) => self.positional(text),
                _ => {
                    self.phase = ScanState::Positionals;
                    self.args.push(token.to_string());
                    Ok(())
                }
            };
        }

        match token {
            Token::Separator => {
                self.phase = ScanState::AfterSeparator;
                Ok(())
            }
            Token::Positional(text) => self.positional(text),
            Token::LongFlag { name, value } => self.long_flag(name, value.as_deref()),
            Token::ShortCluster { chars, value } => self.short_cluster(chars, value.as_deref()),
        }
    }

    /// The token after a flag that takes a value
    fn feed_pending(&mut self, pending: Pending, token: &Token) -> ParseResult<()> {
        let Some(spec) = self.spec_of(&pending) else {
            if let Token::Positional(text) = token {
                debug!(value = %text, "dropping value of ignored flag");
                return Ok(());
            }
            return self.feed(token);
        };

        let looks_like_flag = token.is_flag() || *token == Token::Separator;
        if let (Some(fallback), true) = (spec.no_opt_value(), looks_like_flag) {
            self.supply(&pending, Some(fallback))?;
            return self.feed(token);
        }

        match token {
            Token::Positional(text) => self.supply(&pending, Some(text)),
            Token::Separator => Err(ParseError::MissingValue(spec.name().to_string())),
            _ if self.recognizes(token) => Err(ParseError::MissingValue(spec.name().to_string())),
            _ => self.supply(&pending, Some(&token.to_string())),
        }
    }

    /// Validate the scan result and build the invocation record
    pub(crate) fn finish(mut self) -> ParseResult<InvocationRecord> {
        if let Some(pending) = self.pending.take() {
            if let Some(spec) = self.spec_of(&pending) {
                match spec.no_opt_value() {
                    Some(fallback) => self.supply(&pending, Some(fallback))?,
                    None => return Err(ParseError::MissingValue(spec.name().to_string())),
                }
            }
        }

        let node = self.tree.node(self.current);
        if let Some(name) = &self.unmatched {
            if node.has_children() && !node.is_runnable() {
                return Err(ParseError::UnknownCommand {
                    name: name.clone(),
                    suggestions: self.command_suggestions(name),
                });
            }
        }

        if let Some(held) = self.held.first() {
            return Err(ParseError::UnknownFlag {
                name: held.typed.clone(),
                suggestions: self.typed_flag_suggestions(&held.typed),
            });
        }

        for (name, binding) in self.bindings.iter_mut() {
            if binding.source != ValueSource::Default {
                continue;
            }
            let Some(key) = binding.spec.env_key() else {
                continue;
            };
            let Some(raw) = self.env.var(key) else {
                continue;
            };
            binding.value = match binding.spec.kind() {
                FlagKind::List => FlagValue::List(split_list(&raw)),
                _ => binding
                    .spec
                    .coerce(&raw)
                    .map_err(|expected| ParseError::InvalidValue {
                        flag: name.clone(),
                        raw: raw.clone(),
                        expected,
                    })?,
            };
            binding.source = ValueSource::Environment;
            debug!(flag = %name, env = %key, "bound flag from environment");
        }

        if let Some((name, _)) = self
            .bindings
            .iter()
            .find(|(_, b)| b.spec.is_required() && b.source == ValueSource::Default)
        {
            return Err(ParseError::MissingRequired(name.clone()));
        }
        self.check_groups()?;

        debug!(command = %node.name(), args = self.args.len(), "resolved");
        Ok(InvocationRecord {
            command: self.current,
            path: self.tree.path_names(self.current),
            invoked_as: self.invoked_as,
            flags: self
                .bindings
                .iter()
                .map(|(name, b)| (name.clone(), b.to_bound()))
                .collect(),
            args: self.args,
            deprecations: self.deprecations,
        })
    }

    /// Apply the flag groups of the reached command and its ancestors.
    /// A group is skipped when any member is out of scope here.
    fn check_groups(&self) -> ParseResult<()> {
        let mut groups = self.tree.flag_groups(self.current);
        groups.sort_by_key(|g| g.rule);

        for group in groups {
            if !group.flags.iter().all(|f| self.bindings.contains_key(f)) {
                trace!(flags = ?group.flags, "flag group out of scope");
                continue;
            }
            let set = group
                .flags
                .iter()
                .filter(|f| self.bindings[f.as_str()].source != ValueSource::Default)
                .count();
            let names = || group.flags.iter().map(|f| format!("--{}", f)).collect::<Vec<_>>();
            match group.rule {
                GroupRule::MutuallyExclusive if set > 1 => {
                    return Err(ParseError::MutuallyExclusive(names()))
                }
                GroupRule::OneRequired if set == 0 => return Err(ParseError::OneRequired(names())),
                GroupRule::RequiredTogether if set != 0 && set != group.flags.len() => {
                    return Err(ParseError::RequiredTogether(names()))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn positional(&mut self, text: &str) -> ParseResult<()> {
        let matching = matches!(self.phase, ScanState::Root | ScanState::InPath);
        if matching && self.tree.node(self.current).has_children() {
            if let Some(child) = self.match_child(text)? {
                self.descend(child, text)?;
                return Ok(());
            }
            self.unmatched = Some(text.to_string());
        }
        self.phase = ScanState::Positionals;
        self.args.push(text.to_string());
        Ok(())
    }

    /// Exact name or alias first, then a unique prefix when enabled
    fn match_child(&self, text: &str) -> ParseResult<Option<CommandId>> {
        if let Some(child) = self.tree.child_named(self.current, text) {
            return Ok(Some(child));
        }
        if !self.config.prefix_matching || text.is_empty() {
            return Ok(None);
        }

        let matches: Vec<CommandId> = self
            .tree
            .node(self.current)
            .children()
            .iter()
            .copied()
            .filter(|c| {
                let node = self.tree.node(*c);
                !node.is_hidden() && node.invocation_names().any(|n| n.starts_with(text))
            })
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => {
                let mut candidates: Vec<String> = matches
                    .iter()
                    .map(|c| self.tree.node(*c).name().to_string())
                    .collect();
                candidates.sort();
                Err(ParseError::AmbiguousCommand {
                    prefix: text.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Move to `child`, rebinding flags against its effective set.
    ///
    /// Flags the child cannot see are dropped; they were valid where they
    /// were typed. Held flags the child declares are bound now.
    fn descend(&mut self, child: CommandId, token: &str) -> ParseResult<()> {
        let node = self.tree.node(child);
        debug!(command = %node.name(), via = %token, "descending");
        if let Some(message) = node.deprecation() {
            warn!(command = %node.name(), "{}", message);
            self.deprecations
                .push(format!("command \"{}\" is deprecated: {}", node.name(), message));
        }

        let mut previous = std::mem::take(&mut self.bindings);
        for scoped in self.tree.effective_flags(child).iter() {
            let name = scoped.spec.name();
            let binding = match previous.remove(name) {
                Some(b) if b.owner == scoped.owner => b,
                Some(b) if b.is_explicit() => {
                    let mut fresh = Binding::from_default(scoped);
                    for raw in &b.occurrences {
                        fresh.apply(raw.as_deref())?;
                    }
                    fresh
                }
                _ => Binding::from_default(scoped),
            };
            self.bindings.insert(name.to_string(), binding);
        }
        for (name, _) in previous.iter().filter(|(_, b)| b.is_explicit()) {
            debug!(flag = %name, command = %node.name(), "flag out of scope, dropping it");
        }

        self.current = child;
        self.invoked_as = token.to_string();
        self.phase = if node.has_children() {
            ScanState::InPath
        } else {
            ScanState::Positionals
        };
        if !node.parses_flags() {
            self.verbatim = true;
        }

        for held in std::mem::take(&mut self.held) {
            if !self.bindings.contains_key(&held.name) {
                self.held.push(held);
                continue;
            }
            debug!(flag = %held.name, "binding held flag");
            let spec = Arc::clone(&self.bindings[&held.name].spec);
            self.note_deprecated(&spec);
            self.bind(&held.name, held.raw.as_deref())?;
        }
        Ok(())
    }

    fn long_flag(&mut self, name: &str, inline: Option<&str>) -> ParseResult<()> {
        if let Some(canonical) = self.lookup(name) {
            return self.occur(&canonical, inline);
        }

        if let Some(target) = self.negated_bool(name) {
            let raw = match inline {
                None => "false",
                Some(v) => match parse_bool(v) {
                    Some(true) => "false",
                    Some(false) => "true",
                    None => return Err(ParseError::invalid_value(&target, v, FlagKind::Bool)),
                },
            };
            return self.bind(&target, Some(raw));
        }

        if let Some(spec) = self.named_below(name) {
            return self.hold(format!("--{}", name), spec, inline);
        }
        self.unknown_flag(format!("--{}", name), inline.is_none())
    }

    fn short_cluster(&mut self, chars: &str, inline: Option<&str>) -> ParseResult<()> {
        if !self.config.short_flag_grouping && chars.chars().nth(1).is_some() {
            return self.unknown_flag(format!("-{}", chars), inline.is_none());
        }

        let shorthands: Vec<(usize, char)> = chars.char_indices().collect();
        for (pos, (offset, c)) in shorthands.iter().enumerate() {
            let last = pos + 1 == shorthands.len();
            let typed = format!("-{}", c);
            let Some((spec, visible)) = self.shorthand_target(*c) else {
                self.unknown_flag(typed, last && inline.is_none())?;
                continue;
            };

            if last {
                return self.hit(spec, visible, typed, inline);
            }
            if !spec.kind().takes_value() {
                self.hit(spec, visible, typed, None)?;
                continue;
            }
            return match self.config.short_values {
                ShortValuePolicy::FinalOnly => Err(ParseError::MisplacedShorthand {
                    cluster: chars.to_string(),
                    flag: *c,
                }),
                ShortValuePolicy::Attached => {
                    let mut raw = chars[offset + c.len_utf8()..].to_string();
                    if let Some(v) = inline {
                        raw.push('=');
                        raw.push_str(v);
                    }
                    self.hit(spec, visible, typed, Some(&raw))
                }
            };
        }
        Ok(())
    }

    /// The flag a shorthand names, and whether it is visible here or only
    /// declared below
    fn shorthand_target(&self, c: char) -> Option<(Arc<FlagSpec>, bool)> {
        if let Some(scoped) = self.tree.effective_flags(self.current).by_shorthand(c) {
            return Some((Arc::clone(&scoped.spec), true));
        }
        self.below(|spec| spec.shorthand() == Some(c))
            .map(|spec| (spec, false))
    }

    fn hit(&mut self, spec: Arc<FlagSpec>, visible: bool, typed: String, inline: Option<&str>) -> ParseResult<()> {
        if visible {
            self.occur(spec.name(), inline)
        } else {
            self.hold(typed, spec, inline)
        }
    }

    /// One occurrence of a known flag: bind now or wait for the next token
    fn occur(&mut self, name: &str, inline: Option<&str>) -> ParseResult<()> {
        let spec = Arc::clone(&self.bindings[name].spec);
        self.note_deprecated(&spec);

        if inline.is_none() && spec.kind().takes_value() {
            self.pending = Some(Pending::Flag(name.to_string()));
            return Ok(());
        }
        self.bind(name, inline)
    }

    /// Keep an occurrence of a flag declared further down until the scan
    /// reaches a command that sees it
    fn hold(&mut self, typed: String, spec: Arc<FlagSpec>, inline: Option<&str>) -> ParseResult<()> {
        debug!(flag = %spec.name(), "holding flag for a subcommand");
        self.held.push(Held {
            typed,
            name: spec.name().to_string(),
            raw: inline.map(str::to_string),
        });
        if inline.is_none() && spec.kind().takes_value() {
            self.pending = Some(Pending::Held(spec));
        }
        Ok(())
    }

    fn unknown_flag(&mut self, typed: String, may_take_value: bool) -> ParseResult<()> {
        if !self.config.allow_unknown_flags {
            let suggestions = self.typed_flag_suggestions(&typed);
            return Err(ParseError::UnknownFlag {
                name: typed,
                suggestions,
            });
        }
        debug!(flag = %typed, "ignoring unknown flag");
        if may_take_value {
            self.pending = Some(Pending::Unknown);
        }
        Ok(())
    }

    fn bind(&mut self, name: &str, raw: Option<&str>) -> ParseResult<()> {
        match self.bindings.get_mut(name) {
            Some(binding) => binding.apply(raw),
            None => Err(ParseError::UnknownFlag {
                name: format!("--{}", name),
                suggestions: Vec::new(),
            }),
        }
    }

    fn supply(&mut self, pending: &Pending, raw: Option<&str>) -> ParseResult<()> {
        match pending {
            Pending::Flag(name) => self.bind(name, raw),
            Pending::Held(_) => {
                if let Some(held) = self.held.last_mut() {
                    held.raw = raw.map(str::to_string);
                }
                Ok(())
            }
            Pending::Unknown => Ok(()),
        }
    }

    fn spec_of(&self, pending: &Pending) -> Option<Arc<FlagSpec>> {
        match pending {
            Pending::Flag(name) => self.bindings.get(name).map(|b| Arc::clone(&b.spec)),
            Pending::Held(spec) => Some(Arc::clone(spec)),
            Pending::Unknown => None,
        }
    }

    fn note_deprecated(&mut self, spec: &FlagSpec) {
        let Some(message) = spec.deprecation() else {
            return;
        };
        let notice = format!("flag \"--{}\" is deprecated: {}", spec.name(), message);
        if !self.deprecations.contains(&notice) {
            warn!(flag = %spec.name(), "{}", message);
            self.deprecations.push(notice);
        }
    }

    /// The binding name a typed long flag refers to
    fn lookup(&self, typed: &str) -> Option<String> {
        if self.bindings.contains_key(typed) {
            return Some(typed.to_string());
        }
        let style = self.config.normalize_flag_names;
        if style == NameNormalization::Exact {
            return None;
        }
        let wanted = style.normalize(typed);
        self.bindings
            .keys()
            .find(|name| style.normalize(name) == wanted)
            .cloned()
    }

    /// `no-<name>` of a visible boolean
    fn negated_bool(&self, typed: &str) -> Option<String> {
        if !self.config.bool_negation {
            return None;
        }
        let normalized = self.config.normalize_flag_names.normalize(typed);
        let target = self.lookup(normalized.strip_prefix("no-")?)?;
        (self.bindings[&target].spec.kind() == FlagKind::Bool).then_some(target)
    }

    /// First flag below the current command that `matches`, when child
    /// flags may come before the subcommand name
    fn below<F>(&self, accept: F) -> Option<Arc<FlagSpec>>
    where
        F: Fn(&FlagSpec) -> bool,
    {
        if !self.config.traverse_children || !matches!(self.phase, ScanState::Root | ScanState::InPath) {
            return None;
        }
        self.tree.descendants(self.current).into_iter().find_map(|id| {
            self.tree
                .effective_flags(id)
                .iter()
                .find(|scoped| accept(scoped.spec.as_ref()))
                .map(|scoped| Arc::clone(&scoped.spec))
        })
    }

    fn named_below(&self, typed: &str) -> Option<Arc<FlagSpec>> {
        let style = self.config.normalize_flag_names;
        let wanted = style.normalize(typed);
        self.below(|spec| style.normalize(spec.name()) == wanted)
    }

    /// Whether a flag token names a flag the scan would accept here
    fn recognizes(&self, token: &Token) -> bool {
        match token {
            Token::LongFlag { name, .. } => {
                self.lookup(name).is_some()
                    || self.negated_bool(name).is_some()
                    || self.named_below(name).is_some()
            }
            Token::ShortCluster { chars, .. } => chars
                .chars()
                .next()
                .map_or(false, |c| self.shorthand_target(c).is_some()),
            _ => false,
        }
    }

    /// Suggestions for a flag as typed; only long names get any
    fn typed_flag_suggestions(&self, typed: &str) -> Vec<String> {
        match typed.strip_prefix("--") {
            Some(name) => self.flag_suggestions(name),
            None => Vec::new(),
        }
    }

    fn flag_suggestions(&self, typed: &str) -> Vec<String> {
        if !self.config.suggestions {
            return Vec::new();
        }
        let visible = self
            .bindings
            .values()
            .filter(|b| !b.spec.is_hidden())
            .map(|b| b.spec.name());
        suggest(typed, visible, self.config.suggestion_distance)
            .into_iter()
            .map(|name| format!("--{}", name))
            .collect()
    }

    fn command_suggestions(&self, typed: &str) -> Vec<String> {
        if !self.config.suggestions {
            return Vec::new();
        }
        let tree = self.tree;
        let visible = tree
            .node(self.current)
            .children()
            .iter()
            .map(|c| tree.node(*c))
            .filter(|n| !n.is_hidden())
            .map(|n| n.name());
        suggest(typed, visible, self.config.suggestion_distance)
    }
}
