//! Resolve namespaced tool names to connectors and dispatch calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::arguments::ToolArguments;
use super::connector::ToolConnector;
use super::types::{InputSchema, ToolDescriptor, ToolOutput, NAMESPACE_SEPARATOR};
use super::validation::validate_arguments;
use crate::error::{ChatError, ToolError};
use crate::util::timeout::with_tool_deadline;

/// Default per-call deadline.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Split `server__tool` into its two parts.
///
/// Exactly one separator and two non-empty parts are accepted.
pub fn split_namespaced(name: &str) -> Result<(&str, &str), ToolError> {
    let mut parts = name.split(NAMESPACE_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(server), Some(tool), None) if !server.is_empty() && !tool.is_empty() => {
            Ok((server, tool))
        }
        _ => Err(ToolError::MalformedName {
            name: name.to_string(),
        }),
    }
}

/// Routes tool calls to registered connectors.
pub struct ToolRouter {
    connectors: HashMap<String, Arc<dyn ToolConnector>>,
    catalog: Vec<ToolDescriptor>,
    schemas: HashMap<String, InputSchema>,
    timeout: Duration,
}

impl Default for ToolRouter {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

impl ToolRouter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connectors: HashMap::new(),
            catalog: Vec::new(),
            schemas: HashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a connector and expose its tools under `server__<tool>`.
    ///
    /// Returns the number of tools added. A connector that fails to start or
    /// list its tools is skipped with a warning and contributes nothing.
    pub async fn register(
        &mut self,
        server: &str,
        connector: Arc<dyn ToolConnector>,
    ) -> Result<usize, ChatError> {
        if server.is_empty() || server.contains(NAMESPACE_SEPARATOR) {
            return Err(ChatError::Configuration(format!(
                "invalid tool server name '{server}'"
            )));
        }
        if self.connectors.contains_key(server) {
            return Err(ChatError::Configuration(format!(
                "tool server '{server}' is already registered"
            )));
        }

        if let Err(e) = connector.start().await {
            warn!(server, error = %e, "failed to start tool server, skipping");
            return Ok(0);
        }
        let tools = match connector.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(server, error = %e, "failed to list tools, skipping server");
                if let Err(e) = connector.close().await {
                    debug!(server, error = %e, "close after failed listing");
                }
                return Ok(0);
            }
        };

        let count = tools.len();
        for tool in tools {
            let namespaced = tool.namespaced(server);
            self.schemas
                .insert(namespaced.name.clone(), namespaced.input_schema.clone());
            self.catalog.push(namespaced);
        }
        self.connectors.insert(server.to_string(), connector);
        info!(server, tools = count, "registered tool server");
        Ok(count)
    }

    /// Namespaced descriptors of every registered tool.
    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    /// Names of registered servers, sorted.
    pub fn servers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dispatch one call by namespaced name.
    ///
    /// `arguments` is the raw payload from the model. It is decoded into a
    /// JSON object and checked against the tool's schema when one is known.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let (server, tool) = split_namespaced(name)?;
        let connector = self
            .connectors
            .get(server)
            .ok_or_else(|| ToolError::UnknownServer {
                server: server.to_string(),
            })?;

        let args = ToolArguments::decode(name, arguments)?;
        if let Some(schema) = self.schemas.get(name) {
            validate_arguments(name, &args, schema)?;
        }

        info!(tool = name, "dispatching tool call");
        let result = with_tool_deadline(name, self.timeout, cancel, connector.call_tool(tool, &args)).await;
        if let Err(ref e) = result {
            warn!(tool = name, error = %e, "tool call failed");
        }
        result
    }

    /// Close every connector. Failures are logged and do not stop the sweep.
    pub async fn close_all(&self) {
        for (server, connector) in &self.connectors {
            if let Err(e) = connector.close().await {
                warn!(server = server.as_str(), error = %e, "failed to close tool server");
            }
        }
    }
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("servers", &self.servers())
            .field("tools", &self.catalog.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
