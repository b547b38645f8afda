//! Question drafting over coarse chunks.

pub mod dedup;
pub mod generator;
pub mod parse;

pub use dedup::*;
pub use generator::*;
pub use parse::*;
