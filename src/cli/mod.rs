//! CLI argument parsing and process setup for `mcpchat`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::{ChatConfig, McpServerConfig};
use crate::error::{ChatError, Result, ToolError};
use crate::tools::{InputSchema, LocalConnector, LocalTool, ToolOutput, ToolRouter};

/// Name under which the built-in tools are exposed.
pub const BUILTIN_SERVER: &str = "local";

/// Chat with a model that can call MCP tools.
#[derive(Parser, Debug)]
#[command(name = "mcpchat", version, about = "Streamed agent chat over MCP tool servers")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "MCPCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON list of MCP servers: [{"name": ..., "url": ...}]
    #[arg(long, global = true)]
    pub servers: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a prompt, or start an interactive session when none is given
    Chat(ChatArgs),
    /// List the tools the model can call
    Tools,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model to use (format: provider:model, e.g. ollama:llama3.1)
    #[arg(short, long)]
    pub model: Option<String>,

    /// User that owns the session
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Session creation timestamp; reuse one to continue a session
    #[arg(long)]
    pub created_at: Option<i64>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Use the non-streaming backend endpoint
    #[arg(long)]
    pub no_stream: bool,

    /// User prompt (positional)
    pub prompt: Option<String>,
}

impl ChatArgs {
    /// Fold command-line overrides into `config`.
    pub fn apply(&self, config: &mut ChatConfig) {
        if let Some(ref model) = self.model {
            config.model = model.clone();
        }
        if let Some(ref system) = self.system {
            config.system_prompt = Some(system.clone());
        }
        if self.temperature.is_some() {
            config.temperature = self.temperature;
        }
        if self.max_tokens.is_some() {
            config.max_tokens = self.max_tokens;
        }
        if self.no_stream {
            config.stream = false;
        }
    }
}

/// Install the stderr log subscriber (`RUST_LOG`, default `mcpchat=info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mcpchat=info"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}

/// Load configuration, merging an optional JSON server list.
pub fn load_config(cli: &Cli) -> Result<ChatConfig> {
    let mut config = ChatConfig::load(cli.config.as_deref())?;
    if let Some(ref path) = cli.servers {
        config.mcp_servers.extend(McpServerConfig::load_json(path)?);
        config.validate()?;
    }
    Ok(config)
}

/// Router with the built-in tools and every configured MCP server.
pub async fn build_router(config: &ChatConfig) -> Result<ToolRouter> {
    let mut router = ToolRouter::new(config.tool_timeout());
    router
        .register(BUILTIN_SERVER, Arc::new(builtin_tools()))
        .await?;
    crate::mcp::register_servers(&mut router, &config.mcp_servers).await?;
    Ok(router)
}

/// Small in-process tool set available without any MCP server.
pub fn builtin_tools() -> LocalConnector {
    LocalConnector::new()
        .with_tool(LocalTool::new(
            "now",
            "Current date and time in UTC (RFC 3339)",
            InputSchema::empty(),
            |_args| async move { Ok(ToolOutput::text(chrono::Utc::now().to_rfc3339())) },
        ))
        .with_tool(LocalTool::new(
            "calculate",
            "Apply an arithmetic operation (add, subtract, multiply, divide) to two numbers",
            InputSchema::object()
                .string("operation", "add, subtract, multiply or divide", true)
                .number("a", "left operand", true)
                .number("b", "right operand", true)
                .build(),
            |args| async move {
                let a = args.get_f64("a").unwrap_or_default();
                let b = args.get_f64("b").unwrap_or_default();
                let value = match args.get_str("operation").unwrap_or_default() {
                    "add" => a + b,
                    "subtract" => a - b,
                    "multiply" => a * b,
                    "divide" if b == 0.0 => {
                        return Err(ToolError::Execution {
                            tool: "calculate".into(),
                            message: "division by zero".into(),
                        })
                    }
                    "divide" => a / b,
                    other => {
                        return Err(ToolError::InvalidArguments {
                            tool: "calculate".into(),
                            message: format!("unknown operation '{other}'"),
                        })
                    }
                };
                Ok(ToolOutput::text(value.to_string()))
            },
        ))
}

/// Map a failed run to the line shown to the user.
pub fn describe_error(error: &ChatError) -> String {
    match error {
        ChatError::Canceled => "canceled".to_string(),
        other => other.to_string(),
    }
}
