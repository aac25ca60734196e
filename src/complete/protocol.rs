//! Dynamic completion protocol
//!
//! A dynamic script runs `<program> --__complete <line> <cursor> [shell]`
//! on every completion request. The program answers with one candidate per
//! line, optionally followed by a tab and a description, and a final
//! `:<directive>` line.

use crate::complete::{CompletionContext, Prediction, ShellDialect};
use std::io::{self, Write};

/// Hidden flag that switches a program into completion mode
pub const COMPLETE_FLAG: &str = "--__complete";

/// Recognize a completion request in `argv` (program name excluded).
///
/// Returns `None` unless the first argument is [`COMPLETE_FLAG`]. A missing
/// or unparsable cursor means the end of the line.
pub fn completion_request<S: AsRef<str>>(argv: &[S]) -> Option<CompletionContext> {
    let (first, rest) = argv.split_first()?;
    if first.as_ref() != COMPLETE_FLAG {
        return None;
    }

    let line = rest.first().map(|s| s.as_ref()).unwrap_or_default();
    let cursor = rest
        .get(1)
        .and_then(|s| s.as_ref().parse::<usize>().ok())
        .unwrap_or_else(|| line.chars().count());

    let mut context = CompletionContext::from_line(line, cursor);
    if let Some(shell) = rest.get(2).and_then(|s| s.as_ref().parse::<ShellDialect>().ok()) {
        context = context.with_shell(shell);
    }
    Some(context)
}

/// Write `prediction` in the protocol format.
///
/// Descriptions are only sent to shells that can display them.
pub fn write_prediction<W: Write>(
    out: &mut W,
    prediction: &Prediction,
    shell: Option<ShellDialect>,
) -> io::Result<()> {
    let describe = shell.map_or(false, ShellDialect::shows_descriptions);
    for candidate in &prediction.candidates {
        match prediction.description(candidate).filter(|_| describe) {
            Some(about) => writeln!(out, "{}\t{}", candidate, about)?,
            None => writeln!(out, "{}", candidate)?,
        }
    }
    writeln!(out, ":{}", prediction.directive.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete::Directive;

    #[test]
    fn test_completion_request() {
        assert!(completion_request(&["run"]).is_none());
        assert!(completion_request::<&str>(&[]).is_none());

        let context = completion_request(&[COMPLETE_FLAG, "app server st", "13", "zsh"]).unwrap();
        assert_eq!(context.words, vec!["server"]);
        assert_eq!(context.partial, "st");
        assert_eq!(context.shell, Some(ShellDialect::Zsh));
    }

    #[test]
    fn test_cursor_truncates_line() {
        let context = completion_request(&[COMPLETE_FLAG, "app server start", "7"]).unwrap();
        assert!(context.words.is_empty());
        assert_eq!(context.partial, "se");
        assert_eq!(context.shell, None);
    }

    #[test]
    fn test_missing_cursor_means_end_of_line() {
        let context = completion_request(&[COMPLETE_FLAG, "app server "]).unwrap();
        assert_eq!(context.words, vec!["server"]);
        assert_eq!(context.partial, "");
    }

    #[test]
    fn test_write_prediction() {
        let mut prediction = Prediction::new(vec!["start".into(), "stop".into()], Directive::NoFileComp);
        prediction.descriptions.insert("start".into(), "Start the server".into());

        let mut out = Vec::new();
        write_prediction(&mut out, &prediction, Some(ShellDialect::Fish)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "start\tStart the server\nstop\n:4\n");

        let mut out = Vec::new();
        write_prediction(&mut out, &prediction, Some(ShellDialect::Bash)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "start\nstop\n:4\n");
    }
}
