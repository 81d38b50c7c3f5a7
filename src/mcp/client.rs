//! MCP tool connector over the streamable HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, Content, ResourceContents},
    service::{ClientInitializeError, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::StreamableHttpClientTransport,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::McpServerConfig;
use crate::error::{ChatError, ToolError};
use crate::tools::{InputSchema, ToolArguments, ToolConnector, ToolDescriptor, ToolOutput};
use crate::types::ToolContent;

pub type McpService = RunningService<RoleClient, ()>;

/// A [`ToolConnector`] backed by one remote MCP server.
pub struct McpConnector {
    name: String,
    url: String,
    connect_timeout: Duration,
    service: RwLock<Option<McpService>>,
}

impl McpConnector {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            connect_timeout: Duration::from_secs(30),
            service: RwLock::new(None),
        }
    }

    pub fn from_config(config: &McpServerConfig) -> Self {
        let mut connector = Self::new(&config.name, &config.url);
        if let Some(secs) = config.timeout_secs {
            connector.connect_timeout = Duration::from_secs(secs);
        }
        connector
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn is_connected(&self) -> bool {
        self.service.read().await.is_some()
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn start(&self) -> Result<(), ChatError> {
        let mut guard = self.service.write().await;
        if guard.is_some() {
            return Ok(());
        }

        debug!(server = %self.name, url = %self.url, "connecting to MCP server");
        let transport = StreamableHttpClientTransport::from_uri(self.url.as_str());
        let service = tokio::time::timeout(self.connect_timeout, ().serve(transport))
            .await
            .map_err(|_| {
                ChatError::Mcp(format!(
                    "{}: initialize timed out after {}s",
                    self.name,
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| map_initialize_error(&self.name, e))?;

        info!(server = %self.name, "connected to MCP server");
        *guard = Some(service);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError> {
        let guard = self.service.read().await;
        let service = guard
            .as_ref()
            .ok_or_else(|| ChatError::Mcp(format!("{}: not connected", self.name)))?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                service
                    .list_tools(None)
                    .await
                    .map_err(|e| ChatError::Mcp(service_error_message("list_tools", e)))?
                    .tools
            }
            Err(e) => return Err(ChatError::Mcp(service_error_message("list_tools", e))),
        };

        Ok(tools.into_iter().map(map_tool_descriptor).collect())
    }

    async fn call_tool(&self, name: &str, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| ToolError::Execution {
            tool: name.to_string(),
            message: format!("MCP server {} is not connected", self.name),
        })?;

        let arguments = if args.as_map().is_empty() {
            None
        } else {
            Some(args.as_map().clone())
        };

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| ToolError::Execution {
                tool: name.to_string(),
                message: service_error_message("call_tool", e),
            })?;

        map_call_result(name, result)
    }

    async fn close(&self) -> Result<(), ChatError> {
        let Some(service) = self.service.write().await.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .map_err(|e| ChatError::Mcp(format!("{}: close failed: {e}", self.name)))?;
        info!(server = %self.name, "closed MCP connection");
        Ok(())
    }
}

fn map_tool_descriptor(tool: rmcp::model::Tool) -> ToolDescriptor {
    let schema = serde_json::Value::Object((*tool.input_schema).clone());
    ToolDescriptor::new(
        tool.name.to_string(),
        tool.description.map(|d| d.to_string()).unwrap_or_default(),
        InputSchema::from_json(&schema),
    )
}

fn map_content(item: &Content) -> ToolContent {
    if let Some(text) = item.as_text() {
        return ToolContent::text(text.text.clone());
    }
    if let Some(image) = item.as_image() {
        return ToolContent::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        };
    }
    if let Some(resource) = item.as_resource() {
        return match &resource.resource {
            ResourceContents::TextResourceContents {
                uri,
                mime_type,
                text,
                ..
            } => ToolContent::Resource {
                uri: uri.clone(),
                mime_type: mime_type.clone(),
                text: Some(text.clone()),
            },
            ResourceContents::BlobResourceContents { uri, mime_type, .. } => {
                ToolContent::Resource {
                    uri: uri.clone(),
                    mime_type: mime_type.clone(),
                    text: None,
                }
            }
        };
    }
    ToolContent::Json {
        value: serde_json::to_value(item).unwrap_or(serde_json::Value::Null),
    }
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolOutput, ToolError> {
    let mut content: Vec<ToolContent> = result.content.iter().map(map_content).collect();

    if result.is_error.unwrap_or(false) {
        let text = content
            .iter()
            .filter_map(ToolContent::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| (!text.is_empty()).then_some(text))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(ToolError::Execution {
            tool: name.to_string(),
            message,
        });
    }

    if let Some(value) = result.structured_content {
        content.push(ToolContent::Json { value });
    }
    Ok(ToolOutput::new(content))
}

fn map_initialize_error(server: &str, error: ClientInitializeError) -> ChatError {
    let detail = match error {
        ClientInitializeError::ConnectionClosed(context) => {
            format!("initialize connection closed: {context}")
        }
        ClientInitializeError::TransportError { error, context } => {
            format!("initialize transport error ({context}): {error}")
        }
        ClientInitializeError::JsonRpcError(error) => {
            format!("initialize JSON-RPC error {}: {}", error.code.0, error.message)
        }
        ClientInitializeError::Cancelled => "initialize cancelled".to_string(),
        other => format!("initialize error: {other}"),
    };
    ChatError::Mcp(format!("{server}: {detail}"))
}

fn service_error_message(context: &str, error: ServiceError) -> String {
    match error {
        ServiceError::McpError(error) => {
            format!("{context}: MCP error {}: {}", error.code.0, error.message)
        }
        ServiceError::TransportSend(error) => format!("{context}: transport send failed: {error}"),
        ServiceError::TransportClosed => format!("{context}: transport closed"),
        ServiceError::UnexpectedResponse => format!("{context}: unexpected MCP response"),
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            format!("{context}: request cancelled{suffix}")
        }
        ServiceError::Timeout { timeout } => {
            format!("{context}: timed out after {}ms", timeout.as_millis())
        }
        other => format!("{context}: service error: {other}"),
    }
}
