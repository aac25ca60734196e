//! clitree - hierarchical command trees for command-line programs
//!
//! A program declares a tree of commands, each with typed flags, and hands
//! `argv` to a [`Resolver`]. Resolution walks the tree, binds every visible
//! flag from the command line, the environment or its default, and returns
//! an [`InvocationRecord`] for the reached command. The same walk drives
//! shell completion, either answered live through a hidden flag or baked
//! into static scripts for bash, zsh, fish and PowerShell.

// Public modules
pub mod cli;
pub mod complete;
pub mod config;
pub mod error;
pub mod flag;
pub mod parse;
pub mod run;
pub mod tree;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use complete::{generate_completion_script, CompletionContext, Prediction, ShellDialect};
pub use error::{BuildError, ClitreeError, ParseError, Result};
pub use flag::{FlagKind, FlagSpec, FlagValue};
pub use parse::{InvocationRecord, Resolver, ResolverConfig};
pub use tree::{Command, CommandId, CommandTree};

/// Current version of clitree
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
