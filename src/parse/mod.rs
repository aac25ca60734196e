//! Command-line resolution
//!
//! Lexing turns raw arguments into tokens; the resolver walks those tokens
//! down a [`CommandTree`](crate::tree::CommandTree) and produces an
//! [`InvocationRecord`].

pub mod lexer;
pub mod record;
pub mod resolver;

// Re-export main types
pub use lexer::*;
pub use record::*;
pub use resolver::*;
