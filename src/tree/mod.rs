//! Command tree
//!
//! This module holds the command builder, the nodes stored in a tree, and
//! the tree itself with its build-time registration API.

pub mod command_tree;
pub mod node;

// Re-export main types
pub use command_tree::*;
pub use node::*;
