//! Handler dispatch
//!
//! Everything here sits outside resolution proper: it answers completion
//! requests, resolves, reports errors and hands the record to whatever run
//! handler the resolved command carries.

use crate::complete::{completion_request, write_prediction};
use crate::parse::Resolver;
use crate::ui;
use std::io::{self, Write};
use tracing::debug;

/// Exit status for a successful run
pub const EXIT_OK: i32 = 0;
/// Exit status when a run handler fails
pub const EXIT_FAILURE: i32 = 1;

/// Run `argv` (program name excluded) and return the process exit code.
///
/// A leading completion flag answers the completion protocol on `out`.
/// Otherwise the arguments are resolved and the command's handler is
/// called; a command without a handler prints its usage. Parse errors are
/// reported with the usage of the deepest command reached and exit with
/// their usage code.
pub fn execute<S, O, E>(resolver: &Resolver<'_>, argv: &[S], out: &mut O, err: &mut E) -> i32
where
    S: AsRef<str>,
    O: Write,
    E: Write,
{
    if let Some(context) = completion_request(argv) {
        let prediction = resolver.predict(&context);
        debug!(candidates = prediction.candidates.len(), "answering completion request");
        return match write_prediction(out, &prediction, context.shell) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                let _ = writeln!(err, "{}", ui::format_error(&e.to_string()));
                EXIT_FAILURE
            }
        };
    }

    let record = match resolver.resolve(argv) {
        Ok(record) => record,
        Err(e) => {
            let reached = resolver.reached(argv);
            let _ = writeln!(err, "{}", ui::format_error(&e.to_string()));
            let _ = write!(err, "\n{}", ui::format_usage(resolver.tree(), reached));
            return e.exit_code();
        }
    };
    for notice in record.deprecations() {
        let _ = writeln!(err, "{}", ui::format_warning(notice));
    }

    let tree = resolver.tree();
    match tree.node(record.command()).run_handler() {
        Some(handler) => match handler(&record) {
            Ok(()) => EXIT_OK,
            Err(e) => {
                let _ = writeln!(err, "{}", ui::format_error(&format!("{:#}", e)));
                EXIT_FAILURE
            }
        },
        None => {
            let _ = write!(out, "{}", ui::format_usage(tree, record.command()));
            EXIT_OK
        }
    }
}

/// [`execute`] over the process arguments and standard streams
pub fn execute_process(resolver: &Resolver<'_>) -> i32 {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let stdout = io::stdout();
    let stderr = io::stderr();
    execute(resolver, &argv, &mut stdout.lock(), &mut stderr.lock())
}
