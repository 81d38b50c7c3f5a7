//! mcpchat: streamed agent chat over MCP tool servers
//!
//! Runs a prompt against a language model backend, lets the model call tools
//! exposed by MCP servers (or in-process connectors), and streams every text
//! fragment to the caller as it is produced. Conversations are kept per
//! [`session::SessionKey`] and compacted to a bounded window.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcpchat::prelude::*;
//!
//! # async fn example() -> mcpchat::error::Result<()> {
//! let config = ChatConfig::load(None)?;
//! let provider = mcpchat::provider::create_provider(&config.model, &config)?;
//! let orchestrator = Orchestrator::new(
//!     provider,
//!     Arc::new(ToolRouter::default()),
//!     Arc::new(SessionStore::new()),
//!     config.orchestrator_options(),
//! );
//!
//! let (sink, mut receiver) = mcpchat::sink::channel(config.queue_capacity, config.chunk_size);
//! let printer = tokio::spawn(async move {
//!     while let Some(fragment) = receiver.recv().await {
//!         print!("{fragment}");
//!     }
//! });
//! orchestrator.run_turn(&SessionKey::now("alice"), "Hello!", sink).await?;
//! let _ = printer.await;
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod sink;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub mod cli;
