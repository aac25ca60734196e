//! Shell completion: prediction, static tables and script rendering

pub mod predict;
pub mod protocol;
pub mod render;
pub mod table;

pub use predict::*;
pub use protocol::*;
pub use render::*;
pub use table::*;
