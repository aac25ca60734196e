//! Typed flags
//!
//! This module defines flag kinds and values, flag definitions, and the
//! per-command registries the resolver consults.

pub mod kind;
pub mod registry;
pub mod spec;
pub mod value;

// Re-export main types
pub use kind::*;
pub use registry::*;
pub use spec::*;
pub use value::*;
