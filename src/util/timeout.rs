//! Deadline and cancellation helpers for tool calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// Run a tool future under a deadline, aborting early if `cancel` fires.
pub async fn with_tool_deadline<T>(
    tool: &str,
    duration: Duration,
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, ToolError>>,
) -> Result<T, ToolError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ToolError::Canceled { tool: tool.to_string() }),
        result = tokio::time::timeout(duration, future) => match result {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: tool.to_string(),
                timeout_ms: duration.as_millis() as u64,
            }),
        },
    }
}
