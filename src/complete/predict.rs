//! Completion prediction
//!
//! Prediction runs the resolver's scanner over the completed words and
//! then asks which tokens are legal next. It never fails: anything the
//! scanner rejects yields an empty candidate set.

use crate::complete::ShellDialect;
use crate::flag::{CompletionHint, FlagSpec};
use crate::parse::resolver::{ScanState, Scanner};
use crate::parse::{lex, BoundFlag, Resolver};
use crate::tree::CommandId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What a completion callback gets to look at
#[derive(Debug, Clone, Copy)]
pub struct CompletionArgs<'a> {
    /// The command reached by the completed words
    pub command: CommandId,
    /// Positional arguments collected so far
    pub args: &'a [String],
    /// Flags bound so far, defaults included
    pub flags: &'a BTreeMap<String, BoundFlag>,
    /// The text being completed; for `--flag=` only the part after `=`
    pub partial: &'a str,
}

/// Computes candidates at completion time. Candidates that do not start
/// with the partial word are dropped; the returned directive is kept.
pub type CompletionFn = Arc<dyn Fn(&CompletionArgs<'_>) -> Prediction + Send + Sync>;

/// One completion request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionContext {
    /// Completed words after the program name
    pub words: Vec<String>,
    /// The word under the cursor, possibly empty
    pub partial: String,
    pub shell: Option<ShellDialect>,
}

impl CompletionContext {
    pub fn new<S: AsRef<str>>(words: &[S], partial: impl Into<String>) -> Self {
        CompletionContext {
            words: words.iter().map(|w| w.as_ref().to_string()).collect(),
            partial: partial.into(),
            shell: None,
        }
    }

    /// Build a context from a full command line and a cursor position.
    ///
    /// The cursor counts characters, not bytes. The line is split with POSIX
    /// shell rules and falls back to whitespace splitting when a quote is
    /// left open. The first word is the program name and is dropped.
    pub fn from_line(line: &str, cursor: usize) -> Self {
        let head: String = line.chars().take(cursor).collect();
        let mut words = shlex::split(&head)
            .unwrap_or_else(|| head.split_whitespace().map(str::to_string).collect());

        let trailing_space = head.is_empty() || head.ends_with(char::is_whitespace);
        let partial = if trailing_space || words.len() < 2 {
            String::new()
        } else {
            words.pop().unwrap_or_default()
        };
        if !words.is_empty() {
            words.remove(0);
        }

        CompletionContext {
            words,
            partial,
            shell: None,
        }
    }

    pub fn with_shell(mut self, shell: ShellDialect) -> Self {
        self.shell = Some(shell);
        self
    }
}

/// What the shell should do besides offering the candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// The shell may fall back to file completion
    Default,
    /// Offer only the candidates
    NoFileComp,
    /// Candidates are file extensions to filter file completion by
    FilterFileExt,
    /// Complete directory names only
    FilterDirs,
}

impl Directive {
    /// Numeric code used by the completion protocol
    pub fn code(self) -> u8 {
        match self {
            Directive::Default => 0,
            Directive::NoFileComp => 4,
            Directive::FilterFileExt => 8,
            Directive::FilterDirs => 16,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Directive::Default),
            4 => Some(Directive::NoFileComp),
            8 => Some(Directive::FilterFileExt),
            16 => Some(Directive::FilterDirs),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Candidates for the word under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub candidates: Vec<String>,
    pub directive: Directive,
    /// One-line descriptions of commands and flags, keyed by candidate
    pub descriptions: BTreeMap<String, String>,
}

impl Prediction {
    pub fn new(candidates: Vec<String>, directive: Directive) -> Self {
        Prediction {
            candidates,
            directive,
            descriptions: BTreeMap::new(),
        }
    }

    pub fn description(&self, candidate: &str) -> Option<&str> {
        self.descriptions.get(candidate).map(String::as_str)
    }

    fn describe(&mut self, candidate: &str, about: Option<&str>) {
        if let Some(line) = about.and_then(|text| text.lines().next()) {
            self.descriptions
                .insert(candidate.to_string(), line.trim().to_string());
        }
    }

    /// Nothing to offer and no file fallback
    pub fn none() -> Self {
        Prediction::new(Vec::new(), Directive::NoFileComp)
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl<'a> Resolver<'a> {
    /// Predict what may be typed at the cursor
    pub fn predict(&self, context: &CompletionContext) -> Prediction {
        let mut scanner = self.scanner();
        for token in lex(&context.words) {
            if let Err(e) = scanner.feed(&token) {
                debug!(error = %e, "prediction stopped at unresolvable input");
                return Prediction::none();
            }
        }

        let partial = context.partial.as_str();
        match scanner.state() {
            ScanState::AwaitingFlagValue => {
                return match scanner.pending_spec() {
                    Some(spec) => flag_values(&scanner, &spec, "", partial),
                    // the value of an ignored unknown flag
                    None => Prediction::new(Vec::new(), Directive::Default),
                };
            }
            ScanState::AfterSeparator => return Prediction::new(Vec::new(), Directive::Default),
            _ => {}
        }

        if !scanner.parses_flags() {
            return command_words(&scanner, partial);
        }

        if let Some((name, prefix)) = partial.strip_prefix("--").and_then(|r| r.split_once('=')) {
            return match scanner.visible_flag(name) {
                Some(spec) if spec.kind().takes_value() => {
                    flag_values(&scanner, &spec, &format!("--{}=", name), prefix)
                }
                _ => Prediction::none(),
            };
        }

        if partial.starts_with('-') {
            return flag_names(&scanner, partial);
        }
        command_words(&scanner, partial)
    }
}

/// Run a completion callback and keep what matches the partial word
fn callback_candidates(scanner: &Scanner<'_>, complete: &CompletionFn, lead: &str, prefix: &str) -> Prediction {
    let flags = scanner.bound_flags();
    let answer = complete(&CompletionArgs {
        command: scanner.current,
        args: &scanner.args,
        flags: &flags,
        partial: prefix,
    });

    let mut prediction = Prediction::new(Vec::new(), answer.directive);
    for candidate in answer.candidates.iter().filter(|c| c.starts_with(prefix)) {
        let full = format!("{}{}", lead, candidate);
        prediction.describe(&full, answer.description(candidate));
        prediction.candidates.push(full);
    }
    prediction
}

fn flag_values(scanner: &Scanner<'_>, spec: &FlagSpec, lead: &str, prefix: &str) -> Prediction {
    if let Some(complete) = scanner.tree().flag_completion(scanner.current, spec.name()) {
        return callback_candidates(scanner, complete, lead, prefix);
    }
    value_candidates(spec.allowed_values(), spec.completion_hint(), lead, prefix)
}

/// Candidates for a flag value.
///
/// A closed value set wins over a path hint. `lead` is prepended to each
/// value, for the `--flag=value` form.
pub(crate) fn value_candidates(
    values: &[String],
    hint: Option<&CompletionHint>,
    lead: &str,
    prefix: &str,
) -> Prediction {
    if !values.is_empty() {
        let candidates = values
            .iter()
            .filter(|v| v.starts_with(prefix))
            .map(|v| format!("{}{}", lead, v))
            .collect();
        return Prediction::new(candidates, Directive::NoFileComp);
    }
    match hint {
        Some(CompletionHint::Files { extensions }) if !extensions.is_empty() => {
            Prediction::new(extensions.clone(), Directive::FilterFileExt)
        }
        Some(CompletionHint::Directories) => Prediction::new(Vec::new(), Directive::FilterDirs),
        _ => Prediction::new(Vec::new(), Directive::Default),
    }
}

fn flag_names(scanner: &Scanner<'_>, partial: &str) -> Prediction {
    let long_only = partial.starts_with("--");
    let mut prediction = Prediction::new(Vec::new(), Directive::NoFileComp);
    for scoped in scanner.tree().effective_flags(scanner.current).iter() {
        let spec = &scoped.spec;
        if spec.is_hidden() {
            continue;
        }
        let used = scanner
            .bindings
            .get(spec.name())
            .map_or(false, |b| b.is_explicit());
        if used && !spec.kind().is_repeatable() {
            continue;
        }

        let long = format!("--{}", spec.name());
        if long.starts_with(partial) {
            prediction.describe(&long, spec.about());
            prediction.candidates.push(long);
        }
        if let Some(c) = spec.shorthand() {
            let short = format!("-{}", c);
            if !long_only && short.starts_with(partial) {
                prediction.describe(&short, spec.about());
                prediction.candidates.push(short);
            }
        }
    }
    prediction
}

fn command_words(scanner: &Scanner<'_>, partial: &str) -> Prediction {
    let tree = scanner.tree();
    let node = tree.node(scanner.current);
    let matching = matches!(scanner.state(), ScanState::Root | ScanState::InPath);

    let mut prediction = Prediction::new(Vec::new(), Directive::NoFileComp);
    if matching {
        for child in node.children() {
            let child = tree.node(*child);
            if child.is_hidden() {
                continue;
            }
            for name in child.invocation_names() {
                if name.starts_with(partial) {
                    prediction.describe(name, child.about());
                    prediction.candidates.push(name.to_string());
                }
            }
        }
    }

    if let Some(complete) = node.valid_args_fn() {
        let dynamic = callback_candidates(scanner, complete, "", partial);
        if prediction.is_empty() {
            prediction.directive = dynamic.directive;
        }
        for arg in dynamic.candidates {
            if !prediction.candidates.contains(&arg) {
                if let Some(about) = dynamic.descriptions.get(&arg) {
                    prediction.descriptions.insert(arg.clone(), about.clone());
                }
                prediction.candidates.push(arg);
            }
        }
        return prediction;
    }

    for arg in node.valid_args() {
        if arg.starts_with(partial) && !prediction.candidates.contains(arg) {
            prediction.candidates.push(arg.clone());
        }
    }

    if prediction.is_empty() && !(matching && node.has_children()) {
        prediction.directive = Directive::Default;
    }
    prediction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::FlagSpec;
    use crate::parse::ResolverConfig;
    use crate::tree::{Command, CommandTree};

    fn tree() -> CommandTree {
        CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("verbose").short('v').persistent())
                .flag(
                    FlagSpec::string("format")
                        .short('f')
                        .persistent()
                        .values(["json", "yaml", "table"]),
                )
                .flag(FlagSpec::string("secret").hidden())
                .subcommand(
                    Command::new("deploy")
                        .alias("d")
                        .valid_args(["staging", "production"])
                        .flag(
                            FlagSpec::string("manifest")
                                .completion(CompletionHint::Files {
                                    extensions: vec!["yaml".to_string(), "yml".to_string()],
                                }),
                        )
                        .flag(FlagSpec::string("workdir").completion(CompletionHint::Directories))
                        .flag(FlagSpec::list("set")),
                )
                .subcommand(Command::new("debug").hidden(true))
                .subcommand(Command::new("destroy")),
        )
        .unwrap()
    }

    fn predict(words: &[&str], partial: &str) -> Prediction {
        tree().predict(&CompletionContext::new(words, partial))
    }

    #[test]
    fn test_root_children_exclude_hidden() {
        let p = predict(&[], "");
        assert_eq!(p.candidates, vec!["deploy", "d", "destroy"]);
        assert_eq!(p.directive, Directive::NoFileComp);
    }

    #[test]
    fn test_child_prefix() {
        assert_eq!(predict(&[], "de").candidates, vec!["deploy", "destroy"]);
    }

    #[test]
    fn test_flag_names_and_shorthands() {
        let p = predict(&[], "-");
        assert_eq!(p.candidates, vec!["--format", "-f", "--verbose", "-v"]);

        let p = predict(&[], "--v");
        assert_eq!(p.candidates, vec!["--verbose"]);
    }

    #[test]
    fn test_used_flags_are_excluded_unless_repeatable() {
        let p = predict(&["deploy", "--verbose", "--set", "a=1"], "--");
        assert!(!p.candidates.contains(&"--verbose".to_string()));
        assert!(p.candidates.contains(&"--set".to_string()));
    }

    #[test]
    fn test_enum_values_for_pending_flag() {
        let p = predict(&["--format"], "");
        assert_eq!(p.candidates, vec!["json", "yaml", "table"]);
        assert_eq!(p.directive, Directive::NoFileComp);

        let p = predict(&["deploy", "-f"], "t");
        assert_eq!(p.candidates, vec!["table"]);
    }

    #[test]
    fn test_inline_value_completion() {
        let p = predict(&[], "--format=y");
        assert_eq!(p.candidates, vec!["--format=yaml"]);
    }

    #[test]
    fn test_path_hints() {
        let p = predict(&["deploy", "--manifest"], "");
        assert_eq!(p.candidates, vec!["yaml", "yml"]);
        assert_eq!(p.directive, Directive::FilterFileExt);

        let p = predict(&["deploy", "--workdir"], "");
        assert!(p.candidates.is_empty());
        assert_eq!(p.directive, Directive::FilterDirs);
    }

    #[test]
    fn test_valid_args_after_leaf() {
        let p = predict(&["d"], "");
        assert_eq!(p.candidates, vec!["staging", "production"]);
        let p = predict(&["deploy", "staging"], "p");
        assert_eq!(p.candidates, vec!["production"]);
    }

    #[test]
    fn test_descriptions() {
        let tree = CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("quiet").short('q').description("Less output"))
                .subcommand(Command::new("init").description("Create a project\nwith defaults")),
        )
        .unwrap();
        let p = tree.predict(&CompletionContext::new::<&str>(&[], ""));
        assert_eq!(p.description("init"), Some("Create a project"));
        let p = tree.predict(&CompletionContext::new::<&str>(&[], "-"));
        assert_eq!(p.description("--quiet"), Some("Less output"));
        assert_eq!(p.description("-q"), Some("Less output"));
    }

    #[test]
    fn test_free_text_falls_back_to_files() {
        let p = predict(&["destroy"], "");
        assert!(p.is_empty());
        assert_eq!(p.directive, Directive::Default);
    }

    #[test]
    fn test_invalid_context_yields_nothing() {
        assert_eq!(predict(&["--bogus"], ""), Prediction::none());
        assert_eq!(predict(&["--format", "--verbose"], ""), Prediction::none());
    }

    #[test]
    fn test_after_separator() {
        let p = predict(&["--", "deploy"], "");
        assert!(p.is_empty());
        assert_eq!(p.directive, Directive::Default);
    }

    #[test]
    fn test_context_from_line() {
        let ctx = CompletionContext::from_line("app deploy --format js", 22);
        assert_eq!(ctx.words, vec!["deploy", "--format"]);
        assert_eq!(ctx.partial, "js");

        let ctx = CompletionContext::from_line("app deploy ", 11);
        assert_eq!(ctx.words, vec!["deploy"]);
        assert_eq!(ctx.partial, "");

        let ctx = CompletionContext::from_line("app 'two words' x", 15);
        assert_eq!(ctx.words, Vec::<String>::new());
        assert_eq!(ctx.partial, "two words");

        let ctx = CompletionContext::from_line("app deploy --format js", 12);
        assert_eq!(ctx.words, vec!["deploy"]);
        assert_eq!(ctx.partial, "-");
    }

    #[test]
    fn test_local_flag_before_subcommand() {
        let p = predict(&["--secret", "s", "deploy"], "");
        assert_eq!(p.candidates, vec!["staging", "production"]);
    }

    #[test]
    fn test_completion_callbacks() {
        let tree = CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::string("region").persistent())
                .flag_completion("region", |_| {
                    Prediction::new(vec!["eu-west".into(), "us-east".into()], Directive::NoFileComp)
                })
                .subcommand(
                    Command::new("logs")
                        .valid_args(["unused"])
                        .valid_args_fn(|args| {
                            let region = args
                                .flags
                                .get("region")
                                .map(|f| f.value.to_string())
                                .unwrap_or_default();
                            Prediction::new(
                                vec![format!("{}-pod", region), "other".to_string()],
                                Directive::Default,
                            )
                        }),
                ),
        )
        .unwrap();

        let p = tree.predict(&CompletionContext::new(&["logs", "--region"], "us"));
        assert_eq!(p.candidates, vec!["us-east"]);
        assert_eq!(p.directive, Directive::NoFileComp);

        let p = tree.predict(&CompletionContext::new(&["logs"], "--region=e"));
        assert_eq!(p.candidates, vec!["--region=eu-west"]);

        let p = tree.predict(&CompletionContext::new(&["logs", "--region", "eu"], ""));
        assert_eq!(p.candidates, vec!["eu-pod", "other"]);
        assert_eq!(p.directive, Directive::Default);

        let p = tree.predict(&CompletionContext::new(&["logs"], "o"));
        assert_eq!(p.candidates, vec!["other"]);
    }

    #[test]
    fn test_no_flag_candidates_once_flag_parsing_stops() {
        let tree = CommandTree::new(
            Command::new("app")
                .flag(FlagSpec::bool("verbose"))
                .subcommand(
                    Command::new("exec")
                        .disable_flag_parsing(true)
                        .valid_args(["-n", "ls"]),
                ),
        )
        .unwrap();
        let p = tree.predict(&CompletionContext::new(&["exec"], "-"));
        assert_eq!(p.candidates, vec!["-n"]);
    }

    #[test]
    fn test_value_of_ignored_flag() {
        let tree = tree();
        let resolver =
            Resolver::new(&tree).with_config(ResolverConfig::default().allow_unknown_flags(true));

        let p = resolver.predict(&CompletionContext::new(&["--bogus"], ""));
        assert!(p.is_empty());
        assert_eq!(p.directive, Directive::Default);

        let p = resolver.predict(&CompletionContext::new(&["--bogus", "x"], "de"));
        assert_eq!(p.candidates, vec!["deploy", "destroy"]);
    }
}
