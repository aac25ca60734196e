//! The clitree developer tool
//!
//! Loads a declarative tree definition and resolves, completes or renders
//! completion scripts for it.

use crate::complete::{generate_script, write_prediction, CompletionContext, ScriptMode, ShellDialect, COMPLETE_FLAG};
use crate::config::{build_tree, parse_definition_auto, parse_definition_file};
use crate::error::ClitreeError;
use crate::parse::{Resolver, ResolverConfig};
use crate::tree::CommandTree;
use crate::ui;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

/// Output verbosity selected by the global flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    /// Default `tracing` filter directive for this verbosity
    pub fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Build the clap command for clitree itself
pub fn build_cli() -> Command {
    Command::new("clitree")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolve and complete command lines against a declarative command tree")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to clitree.yml definition file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print resolver logs (repeat for more)")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("complete")
                .long(COMPLETE_FLAG.trim_start_matches("--"))
                .value_names(["LINE", "CURSOR", "SHELL"])
                .num_args(1..=3)
                .allow_hyphen_values(true)
                .hide(true),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve ARGS against the tree and print the invocation")
                .arg(
                    Arg::new("args")
                        .value_name("ARGS")
                        .num_args(0..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true),
                ),
        )
        .subcommand(
            Command::new("script")
                .about("Print a completion script for the tree")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(clap::value_parser!(ShellDialect)),
                )
                .arg(
                    Arg::new("dynamic")
                        .long("dynamic")
                        .help("Ask the program for candidates instead of embedding them")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("tree").about("Print the command tree"))
        .subcommand(
            Command::new("completions")
                .about("Print a completion script for clitree itself")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(clap::value_parser!(ShellDialect)),
                ),
        )
}

/// The matches global flags are read from: the subcommand's when there is
/// one, since globals propagate down to it
fn globals(matches: &ArgMatches) -> &ArgMatches {
    matches.subcommand().map_or(matches, |(_, sub)| sub)
}

/// Get verbosity level from matches
pub fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    let matches = globals(matches);
    if matches.get_flag("quiet") {
        return Verbosity::Quiet;
    }
    match matches.get_count("verbose") {
        0 => Verbosity::Normal,
        1 => Verbosity::Verbose,
        _ => Verbosity::Trace,
    }
}

/// Load the tree named by `--file`, or the nearest clitree.yml
fn load_tree(matches: &ArgMatches) -> Result<(CommandTree, ResolverConfig), ClitreeError> {
    let definition = match globals(matches).get_one::<PathBuf>("file") {
        Some(path) => parse_definition_file(path)?,
        None => parse_definition_auto()?.0,
    };
    debug!(program = %definition.root.name, "loaded tree definition");
    build_tree(&definition)
}

/// Run clitree on parsed matches, returning the exit code
pub fn run_matches(matches: &ArgMatches) -> Result<i32, ClitreeError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(values) = matches.get_many::<String>("complete") {
        let (tree, config) = load_tree(matches)?;
        let mut argv = vec![COMPLETE_FLAG.to_string()];
        argv.extend(values.cloned());
        let context = crate::complete::completion_request(&argv).unwrap_or_default();
        answer_completion(&tree, config, &context, &mut out)?;
        return Ok(0);
    }

    match matches.subcommand() {
        Some(("completions", sub)) => {
            let Some(shell) = sub.get_one::<ShellDialect>("shell") else {
                return Ok(2);
            };
            clap_complete::generate(
                clap_complete::Shell::from(*shell),
                &mut build_cli(),
                "clitree",
                &mut out,
            );
            Ok(0)
        }
        Some(("resolve", sub)) => {
            let (tree, config) = load_tree(matches)?;
            let args: Vec<String> = sub.get_many::<String>("args").unwrap_or_default().cloned().collect();
            let resolver = Resolver::new(&tree).with_config(config);
            match resolver.resolve(&args) {
                Ok(record) => {
                    for notice in record.deprecations() {
                        eprintln!("{}", ui::format_warning(notice));
                    }
                    write!(out, "{}", ui::format_record(&record))?;
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("{}", ui::format_error(&e.to_string()));
                    eprint!("\n{}", ui::format_usage(&tree, resolver.reached(&args)));
                    Ok(e.exit_code())
                }
            }
        }
        Some(("script", sub)) => {
            let (tree, _) = load_tree(matches)?;
            let Some(shell) = sub.get_one::<ShellDialect>("shell") else {
                return Ok(2);
            };
            let mode = if sub.get_flag("dynamic") {
                ScriptMode::Dynamic
            } else {
                ScriptMode::Static
            };
            write!(out, "{}", generate_script(&tree, *shell, mode))?;
            Ok(0)
        }
        Some(("tree", _)) => {
            let (tree, _) = load_tree(matches)?;
            write!(out, "{}", ui::format_tree(&tree))?;
            Ok(0)
        }
        _ => {
            build_cli().print_help()?;
            println!();
            Ok(0)
        }
    }
}

fn answer_completion<W: Write>(
    tree: &CommandTree,
    config: ResolverConfig,
    context: &CompletionContext,
    out: &mut W,
) -> Result<(), ClitreeError> {
    let prediction = Resolver::new(tree).with_config(config).predict(context);
    write_prediction(out, &prediction, context.shell)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_get_verbosity() {
        let matches = build_cli().get_matches_from(["clitree", "tree"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Normal);

        let matches = build_cli().get_matches_from(["clitree", "-vv", "tree"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Trace);

        let matches = build_cli().get_matches_from(["clitree", "tree", "-q"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Quiet);
    }

    #[test]
    fn test_resolve_takes_trailing_args() {
        let matches =
            build_cli().get_matches_from(["clitree", "-f", "x.yml", "resolve", "--", "server", "--port", "80"]);
        let (_, sub) = matches.subcommand().unwrap();
        let args: Vec<&String> = sub.get_many::<String>("args").unwrap().collect();
        assert_eq!(args, ["server", "--port", "80"]);
        assert_eq!(globals(&matches).get_one::<PathBuf>("file"), Some(&PathBuf::from("x.yml")));
    }

    #[test]
    fn test_hidden_complete_flag() {
        let matches = build_cli().get_matches_from(["clitree", "--__complete", "app se", "6", "bash"]);
        let values: Vec<&String> = matches.get_many::<String>("complete").unwrap().collect();
        assert_eq!(values, ["app se", "6", "bash"]);
    }

    #[test]
    fn test_script_shell_parser() {
        let matches = build_cli().get_matches_from(["clitree", "script", "pwsh", "--dynamic"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<ShellDialect>("shell"), Some(&ShellDialect::PowerShell));
        assert!(sub.get_flag("dynamic"));
    }
}
