//! Error classification used by the retry policy and the orchestrator.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Backend is saturated; eligible for retry.
    Overload,
    Provider,
    Network,
    Timeout,
    Configuration,
    Serialization,
    Canceled,
    Limit,
    Unknown,
}

