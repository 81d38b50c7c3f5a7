//! The capability a tool server exposes to the router.

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::{ToolDescriptor, ToolOutput};
use crate::error::{ChatError, ToolError};

/// A source of callable tools (an MCP server, an in-process registry, ...).
///
/// Tool names seen by a connector are un-namespaced; the router strips the
/// `server__` prefix before calling.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Establish the connection. Called once before any other method.
    async fn start(&self) -> Result<(), ChatError> {
        Ok(())
    }

    /// Tools currently offered by this connector.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError>;

    /// Invoke one tool.
    async fn call_tool(&self, name: &str, args: &ToolArguments) -> Result<ToolOutput, ToolError>;

    /// Release the connection.
    async fn close(&self) -> Result<(), ChatError> {
        Ok(())
    }
}
