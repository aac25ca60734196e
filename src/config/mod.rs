//! Declarative tree definitions
//!
//! This module handles parsing of clitree.yml definition files, their
//! validation, and building a command tree from them.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
