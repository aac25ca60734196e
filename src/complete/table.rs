//! Static completion tables
//!
//! A [`CompletionTable`] flattens a command tree into numbered states, one
//! per command, holding everything a shell needs to complete without calling
//! back into the program. Every static script embeds the table in its
//! [encoded](CompletionTable::encode) form and walks it with the same rules
//! as [`CompletionTable::replay`].

use crate::complete::predict::value_candidates;
use crate::complete::{Directive, Prediction};
use crate::flag::{CompletionHint, FlagKind};
use crate::parse::{lex_one, Token};
use crate::tree::CommandTree;

/// A word that moves the walk into a child command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub word: String,
    pub state: usize,
    /// Hidden commands can be walked into but are never offered
    pub offered: bool,
}

/// A flag visible in one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagEntry {
    pub name: String,
    pub short: Option<char>,
    pub takes_value: bool,
    pub repeatable: bool,
    pub hidden: bool,
    pub negatable: bool,
    pub values: Vec<String>,
    pub hint: Option<CompletionHint>,
}

/// Completion data for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub path: Vec<String>,
    pub children: Vec<ChildEntry>,
    pub flags: Vec<FlagEntry>,
    pub valid_args: Vec<String>,
}

impl TableEntry {
    fn flag(&self, name: &str) -> Option<&FlagEntry> {
        self.flags.iter().find(|f| f.name == name)
    }

    fn flag_by_short(&self, c: char) -> Option<&FlagEntry> {
        self.flags.iter().find(|f| f.short == Some(c))
    }

    fn child(&self, word: &str) -> Option<usize> {
        self.children.iter().find(|c| c.word == word).map(|c| c.state)
    }
}

/// Every command of a tree as numbered completion states; state 0 is the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTable {
    pub program: String,
    pub entries: Vec<TableEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Path,
    Args,
    Separator,
}

impl CompletionTable {
    pub fn new(tree: &CommandTree) -> Self {
        let order = tree.walk();
        let mut state_of = vec![0; tree.len()];
        for (state, id) in order.iter().enumerate() {
            state_of[id.index()] = state;
        }

        let entries = order
            .iter()
            .map(|id| {
                let node = tree.node(*id);
                let children = node
                    .children()
                    .iter()
                    .flat_map(|child| {
                        let child_node = tree.node(*child);
                        let state = state_of[child.index()];
                        let offered = !child_node.is_hidden();
                        child_node.invocation_names().map(move |word| ChildEntry {
                            word: word.to_string(),
                            state,
                            offered,
                        })
                    })
                    .collect();

                let flags = tree
                    .effective_flags(*id)
                    .iter()
                    .map(|scoped| {
                        let spec = &scoped.spec;
                        FlagEntry {
                            name: spec.name().to_string(),
                            short: spec.shorthand(),
                            takes_value: spec.kind().takes_value(),
                            repeatable: spec.kind().is_repeatable(),
                            hidden: spec.is_hidden(),
                            negatable: spec.kind() == FlagKind::Bool,
                            values: spec.allowed_values().to_vec(),
                            hint: spec.completion_hint().cloned(),
                        }
                    })
                    .collect();

                TableEntry {
                    path: tree.path_names(*id).into_iter().skip(1).collect(),
                    children,
                    flags,
                    valid_args: node.valid_args().to_vec(),
                }
            })
            .collect();

        CompletionTable {
            program: tree.program_name().to_string(),
            entries,
        }
    }

    /// Walk `words` the way the generated scripts do and compute the
    /// candidates for `partial`.
    ///
    /// Scripts cannot see flag kinds beyond what the table records, so the
    /// walk is lenient: unknown flags are skipped rather than rejected.
    pub fn replay<S: AsRef<str>>(&self, words: &[S], partial: &str) -> Prediction {
        let mut state = 0;
        let mut walk = Walk::Path;
        let mut pending: Option<&FlagEntry> = None;
        let mut used: Vec<&str> = Vec::new();

        for word in words {
            let word = word.as_ref();
            if pending.take().is_some() || walk == Walk::Separator {
                continue;
            }
            let entry = &self.entries[state];

            match lex_one(word) {
                Token::Separator => walk = Walk::Separator,
                Token::LongFlag { name, value } => {
                    if let Some(flag) = entry.flag(&name) {
                        used.push(&flag.name);
                        if flag.takes_value && value.is_none() {
                            pending = Some(flag);
                        }
                    } else if let Some(flag) = name.strip_prefix("no-").and_then(|t| entry.flag(t)) {
                        if flag.negatable {
                            used.push(&flag.name);
                        }
                    }
                }
                Token::ShortCluster { chars, value } => {
                    let count = chars.chars().count();
                    for (i, c) in chars.chars().enumerate() {
                        let Some(flag) = entry.flag_by_short(c) else {
                            break;
                        };
                        used.push(&flag.name);
                        if flag.takes_value {
                            if i + 1 == count && value.is_none() {
                                pending = Some(flag);
                            }
                            break;
                        }
                    }
                }
                Token::Positional(word) => match entry.child(&word) {
                    Some(child) if walk == Walk::Path => state = child,
                    _ => walk = Walk::Args,
                },
            }
        }

        let entry = &self.entries[state];
        if let Some(flag) = pending {
            return value_candidates(&flag.values, flag.hint.as_ref(), "", partial);
        }
        if walk == Walk::Separator {
            return Prediction::new(Vec::new(), Directive::Default);
        }

        if let Some((name, prefix)) = partial.strip_prefix("--").and_then(|r| r.split_once('=')) {
            return match entry.flag(name) {
                Some(flag) if flag.takes_value => value_candidates(
                    &flag.values,
                    flag.hint.as_ref(),
                    &format!("--{}=", name),
                    prefix,
                ),
                _ => Prediction::none(),
            };
        }

        if partial.starts_with('-') {
            let long_only = partial.starts_with("--");
            let mut candidates = Vec::new();
            for flag in &entry.flags {
                if flag.hidden || (!flag.repeatable && used.contains(&flag.name.as_str())) {
                    continue;
                }
                let long = format!("--{}", flag.name);
                if long.starts_with(partial) {
                    candidates.push(long);
                }
                if let Some(c) = flag.short {
                    let short = format!("-{}", c);
                    if !long_only && short.starts_with(partial) {
                        candidates.push(short);
                    }
                }
            }
            return Prediction::new(candidates, Directive::NoFileComp);
        }

        let matching = walk == Walk::Path;
        let mut candidates: Vec<String> = Vec::new();
        if matching {
            candidates.extend(
                entry
                    .children
                    .iter()
                    .filter(|c| c.offered && c.word.starts_with(partial))
                    .map(|c| c.word.clone()),
            );
        }
        for arg in &entry.valid_args {
            if arg.starts_with(partial) && !candidates.contains(arg) {
                candidates.push(arg.clone());
            }
        }
        let directive = if !candidates.is_empty() || (matching && !entry.children.is_empty()) {
            Directive::NoFileComp
        } else {
            Directive::Default
        };
        Prediction::new(candidates, directive)
    }

    /// Tab separated records, one per line, read by the script drivers:
    ///
    /// ```text
    /// c STATE WORD TARGET OFFERED    child command
    /// f STATE NAME SHORT ATTRS       flag; ATTRS from v r h b, or -
    /// v STATE NAME VALUE             closed flag value
    /// x STATE NAME EXT               file extension hint
    /// d STATE NAME -                 directory hint
    /// a STATE ARG                    valid positional
    /// ```
    ///
    /// Empty fields are written as `-` since shells collapse repeated tabs.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (state, entry) in self.entries.iter().enumerate() {
            for child in &entry.children {
                push_record(
                    &mut out,
                    &["c", &state.to_string(), &child.word, &child.state.to_string(), if child.offered { "1" } else { "0" }],
                );
            }
            for flag in &entry.flags {
                let short = flag.short.map(String::from).unwrap_or_else(|| "-".to_string());
                push_record(&mut out, &["f", &state.to_string(), &flag.name, &short, &flag.attributes()]);
                for value in &flag.values {
                    push_record(&mut out, &["v", &state.to_string(), &flag.name, value]);
                }
                match &flag.hint {
                    Some(CompletionHint::Files { extensions }) => {
                        for ext in extensions {
                            push_record(&mut out, &["x", &state.to_string(), &flag.name, ext]);
                        }
                    }
                    Some(CompletionHint::Directories) => {
                        push_record(&mut out, &["d", &state.to_string(), &flag.name, "-"]);
                    }
                    None => {}
                }
            }
            for arg in &entry.valid_args {
                push_record(&mut out, &["a", &state.to_string(), arg]);
            }
        }
        out
    }
}

impl FlagEntry {
    fn attributes(&self) -> String {
        let mut attrs = String::new();
        if self.takes_value {
            attrs.push('v');
        }
        if self.repeatable {
            attrs.push('r');
        }
        if self.hidden {
            attrs.push('h');
        }
        if self.negatable {
            attrs.push('b');
        }
        if attrs.is_empty() {
            attrs.push('-');
        }
        attrs
    }
}

fn push_record(out: &mut String, fields: &[&str]) {
    let cleaned: Vec<String> = fields
        .iter()
        .map(|f| f.replace(['\t', '\n', '\r'], " "))
        .collect();
    out.push_str(&cleaned.join("\t"));
    out.push('\n');
}
