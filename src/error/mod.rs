//! Error types for mcpchat.

pub mod unified;

pub use unified::ErrorCategory;

use thiserror::Error;

/// Substring that backends use to report a saturated service.
pub const OVERLOAD_SIGNATURE: &str = "overloaded_error";

/// HTTP status some hosted backends return when they are overloaded.
pub const OVERLOADED_STATUS: u16 = 529;

/// Primary error type for orchestration runs.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Service overloaded after {retries} retries, please try again in a few minutes")]
    Overloaded { retries: u32 },

    #[error("Run exceeded the maximum of {max_steps} model steps")]
    MaxStepsExceeded { max_steps: usize },

    #[error("Run canceled: client disconnected")]
    Canceled,

    #[error("MCP error: {0}")]
    Mcp(String),
}

impl ChatError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Api { status, message } => {
                if *status == OVERLOADED_STATUS || carries_overload_signature(message) {
                    ErrorCategory::Overload
                } else {
                    ErrorCategory::Provider
                }
            }
            Self::Provider { message, .. } | Self::Stream(message) => {
                if carries_overload_signature(message) {
                    ErrorCategory::Overload
                } else {
                    ErrorCategory::Provider
                }
            }
            Self::Overloaded { .. } => ErrorCategory::Overload,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::ConfigParse(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Canceled => ErrorCategory::Canceled,
            Self::MaxStepsExceeded { .. } => ErrorCategory::Limit,
            Self::Io(_) | Self::Mcp(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the backend reported a transient capacity problem.
    ///
    /// This is the only class of error the retry policy retries. The final
    /// [`ChatError::Overloaded`] produced after exhaustion is not retryable.
    pub fn is_overloaded(&self) -> bool {
        !matches!(self, Self::Overloaded { .. }) && self.category() == ErrorCategory::Overload
    }
}

fn carries_overload_signature(message: &str) -> bool {
    message.to_ascii_lowercase().contains(OVERLOAD_SIGNATURE)
}

/// Failure of a single tool invocation.
///
/// Tool errors never abort a run: the orchestrator records them as error
/// tool results so the model can react on its next step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid tool name format: {name}")]
    MalformedName { name: String },

    #[error("server not found: {server}")]
    UnknownServer { server: String },

    #[error("invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("error calling tool {tool}: {message}")]
    Execution { tool: String, message: String },

    #[error("tool {tool} timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("tool {tool} canceled")]
    Canceled { tool: String },
}

impl ToolError {
    /// Whether the call failed before any connector was reached.
    pub fn is_routing_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedName { .. } | Self::UnknownServer { .. } | Self::InvalidArguments { .. }
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChatError>;
