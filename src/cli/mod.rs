//! CLI interface and argument parsing
//!
//! This module handles clitree's own command line: loading a definition,
//! resolving against it and rendering completion scripts.

pub mod app;

// Re-export main types
pub use app::*;
