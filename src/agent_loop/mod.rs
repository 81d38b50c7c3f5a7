//! The turn-taking loop between a model and its tools.

pub mod compaction;
pub mod runner;
pub mod types;

pub use compaction::compact;
pub use runner::*;
pub use types::*;
