//! Utility modules: retry and deadlines.

pub mod retry;
pub mod timeout;
