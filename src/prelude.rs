//! Convenience re-exports for common use.

pub use crate::agent_loop::{LoopState, Orchestrator, OrchestratorOptions, RunSummary};
pub use crate::config::{ChatConfig, McpServerConfig};
pub use crate::error::{ChatError, Result, ToolError};
pub use crate::provider::{InferenceProvider, InferenceRequest};
pub use crate::session::{SessionKey, SessionStore};
pub use crate::sink::{StreamReceiver, StreamSink};
pub use crate::tools::{
    InputSchema, LocalConnector, LocalTool, ToolArguments, ToolConnector, ToolDescriptor,
    ToolOutput, ToolRouter,
};
pub use crate::types::{
    ContentBlock, GenerationSettings, Role, TextStreamDelta, ToolResult, ToolUse, Turn, Usage,
};
