//! In-process tool connector hosting closure-based tools.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::connector::ToolConnector;
use super::types::{InputSchema, ToolDescriptor, ToolOutput};
use crate::error::{ChatError, ToolError};

type LocalHandler = dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool.
#[derive(Clone)]
pub struct LocalTool {
    descriptor: ToolDescriptor,
    handler: Arc<LocalHandler>,
}

impl LocalTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        Self {
            descriptor: ToolDescriptor::new(name, description, input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for LocalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTool")
            .field("name", &self.descriptor.name)
            .field("description", &self.descriptor.description)
            .finish()
    }
}

/// A [`ToolConnector`] serving [`LocalTool`]s from the current process.
#[derive(Debug, Clone, Default)]
pub struct LocalConnector {
    tools: BTreeMap<String, LocalTool>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any previous tool with the same name.
    pub fn with_tool(mut self, tool: LocalTool) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolConnector for LocalConnector {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChatError> {
        Ok(self.tools.values().map(|t| t.descriptor.clone()).collect())
    }

    async fn call_tool(&self, name: &str, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Execution {
            tool: name.to_string(),
            message: "tool not found".into(),
        })?;
        (tool.handler)(args.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> LocalTool {
        LocalTool::new(
            "echo",
            "Echo the input",
            InputSchema::object().string("text", "text to echo", true).build(),
            |args: ToolArguments| async move {
                Ok(ToolOutput::text(args.get_str("text").unwrap_or_default()))
            },
        )
    }

    #[tokio::test]
    async fn lists_and_calls_registered_tools() {
        let connector = LocalConnector::new().with_tool(echo());
        let tools = connector.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");

        let args = ToolArguments::decode("echo", &json!({"text": "hi"})).unwrap();
        let output = connector.call_tool("echo", &args).await.unwrap();
        assert_eq!(output.text_fragments().collect::<Vec<_>>(), vec!["hi"]);
    }

    #[tokio::test]
    async fn unknown_local_tool_is_an_execution_error() {
        let connector = LocalConnector::new();
        let err = connector
            .call_tool("missing", &ToolArguments::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }
}
