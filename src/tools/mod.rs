//! Tool catalog, connectors and call routing.

pub mod arguments;
pub mod connector;
pub mod local;
pub mod router;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use connector::ToolConnector;
pub use local::{LocalConnector, LocalTool};
pub use router::{split_namespaced, ToolRouter, DEFAULT_TOOL_TIMEOUT};
pub use types::{namespaced_name, InputSchema, ToolDescriptor, ToolOutput, NAMESPACE_SEPARATOR};
pub use validation::validate_arguments;
