//! Terminal output formatting

use crate::flag::ValueSource;
use crate::parse::InvocationRecord;
use crate::tree::{CommandId, CommandTree};
use colored::Colorize;
use std::fmt::Write;

/// Format an error for stderr
pub fn format_error(message: &str) -> String {
    format!("{} {}", "Error:".red().bold(), message)
}

/// Format a deprecation notice for stderr
pub fn format_warning(message: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), message)
}

/// Describe a resolved invocation: command path, flags with their sources,
/// and positional arguments.
pub fn format_record(record: &InvocationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "command:".bold(), record.path().join(" "));
    if record.path().last().map(String::as_str) != Some(record.invoked_as()) {
        let _ = writeln!(out, "{} {}", "invoked as:".bold(), record.invoked_as());
    }

    let _ = writeln!(out, "{}", "flags:".bold());
    for (name, bound) in record.flags() {
        let source = match bound.source {
            ValueSource::Default => bound.source.to_string().dimmed(),
            ValueSource::CommandLine => bound.source.to_string().green(),
            ValueSource::Environment => bound.source.to_string().cyan(),
        };
        let _ = writeln!(out, "  {} = {} ({})", name, bound.value, source);
    }

    let args: Vec<String> = record.args().iter().map(|a| format!("{:?}", a)).collect();
    let _ = writeln!(out, "{} [{}]", "args:".bold(), args.join(", "));
    out
}

/// Usage text for a command: its invocation line, visible subcommands and
/// visible flags
pub fn format_usage(tree: &CommandTree, id: CommandId) -> String {
    let node = tree.node(id);
    let path = tree.path_names(id).join(" ");
    let mut out = if node.has_children() {
        format!("Usage: {} <command>\n", path)
    } else {
        format!("Usage: {} [flags] [args]\n", path)
    };

    let visible: Vec<_> = node
        .children()
        .iter()
        .map(|c| tree.node(*c))
        .filter(|c| !c.is_hidden())
        .collect();
    if !visible.is_empty() {
        out.push_str("\nAvailable commands:\n");
        let width = visible.iter().map(|c| c.name().len()).max().unwrap_or(0);
        for child in visible {
            let about = child.about().and_then(|a| a.lines().next()).unwrap_or_default();
            let _ = writeln!(out, "  {:width$}  {}", child.name(), about, width = width);
        }
    }

    let flags: Vec<(String, Option<&str>)> = tree
        .effective_flags(id)
        .iter()
        .filter(|scoped| !scoped.spec.is_hidden())
        .map(|scoped| {
            let spec = &scoped.spec;
            let short = spec
                .shorthand()
                .map(|c| format!("-{}, ", c))
                .unwrap_or_else(|| "    ".to_string());
            let mut label = format!("{}--{}", short, spec.name());
            if spec.kind().takes_value() {
                let _ = write!(label, " {}", spec.kind());
            }
            (label, spec.about().and_then(|a| a.lines().next()))
        })
        .collect();
    if !flags.is_empty() {
        out.push_str("\nFlags:\n");
        let width = flags.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        for (label, about) in flags {
            let line = format!("  {:width$}  {}", label, about.unwrap_or_default(), width = width);
            let _ = writeln!(out, "{}", line.trim_end());
        }
    }
    out
}

/// Indented listing of every command, hidden and deprecated ones marked
pub fn format_tree(tree: &CommandTree) -> String {
    let mut out = String::new();
    write_node(tree, tree.root(), 0, &mut out);
    out
}

fn write_node(tree: &CommandTree, id: CommandId, depth: usize, out: &mut String) {
    let node = tree.node(id);
    let mut line = format!("{}{}", "  ".repeat(depth), node.name().bold());
    if !node.aliases().is_empty() {
        let _ = write!(line, " ({})", node.aliases().join(", "));
    }
    if let Some(about) = node.about() {
        let _ = write!(line, "  {}", about.lines().next().unwrap_or_default().dimmed());
    }
    if node.is_hidden() {
        let _ = write!(line, " {}", "[hidden]".yellow());
    }
    if node.deprecation().is_some() {
        let _ = write!(line, " {}", "[deprecated]".red());
    }
    out.push_str(&line);
    out.push('\n');

    for child in node.children() {
        write_node(tree, *child, depth + 1, out);
    }
}
