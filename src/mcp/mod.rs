//! Model Context Protocol tool connector.

pub mod client;

use std::sync::Arc;

pub use client::McpConnector;

use crate::config::McpServerConfig;
use crate::error::Result;
use crate::tools::ToolRouter;

/// Connect every configured server and register it with `router`.
///
/// Servers that cannot be reached are skipped with a warning. Returns the
/// total number of tools registered.
pub async fn register_servers(router: &mut ToolRouter, servers: &[McpServerConfig]) -> Result<usize> {
    let mut total = 0;
    for server in servers {
        let connector = Arc::new(McpConnector::from_config(server));
        total += router.register(&server.name, connector).await?;
    }
    Ok(total)
}
