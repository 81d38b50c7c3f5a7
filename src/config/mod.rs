//! Configuration (layered: defaults > TOML file > environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::agent_loop::OrchestratorOptions;
use crate::error::{ChatError, Result};
use crate::types::GenerationSettings;
use crate::util::retry::RetryPolicy;

/// Default model, as `<provider>:<model>`.
pub const DEFAULT_MODEL: &str = "ollama:llama3.1";

const SERVER_NAME_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Backend and model, e.g. `ollama:llama3.1` or `openai:gpt-4o-mini`.
    pub model: String,
    /// Stream partial text from the backend.
    pub stream: bool,
    pub max_steps: usize,
    /// Number of turns kept after each run. `None` keeps everything.
    pub history_window: Option<usize>,
    pub tool_timeout_secs: u64,
    /// Maximum characters per streamed fragment.
    pub chunk_size: usize,
    /// Bound of the queue between the run and the consumer.
    pub queue_capacity: usize,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub retry: RetryConfig,
    pub ollama: BackendConfig,
    pub openai: BackendConfig,
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            stream: true,
            max_steps: crate::agent_loop::DEFAULT_MAX_STEPS,
            history_window: None,
            tool_timeout_secs: 60,
            chunk_size: crate::sink::DEFAULT_CHUNK_SIZE,
            queue_capacity: crate::sink::DEFAULT_QUEUE_CAPACITY,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            retry: RetryConfig::default(),
            ollama: BackendConfig::default(),
            openai: BackendConfig::default(),
            mcp_servers: Vec::new(),
        }
    }
}

/// `[retry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

/// Connection settings for one inference backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// One MCP server to connect to at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Namespace under which the server's tools are exposed.
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout_secs: None,
        }
    }

    /// Read a JSON server list: `[{"name": "...", "url": "..."}]`.
    pub fn load_json(path: &Path) -> Result<Vec<Self>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ChatConfig {
    /// Load defaults, then the TOML file, then environment overrides.
    ///
    /// With no explicit path the default location is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = lookup("MCPCHAT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama.base_url = Some(url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai.base_url = Some(url);
        }
        if let Some(window) = lookup("MCPCHAT_HISTORY_WINDOW") {
            self.history_window = Some(parse_env_number("MCPCHAT_HISTORY_WINDOW", &window)?);
        }
        if let Some(steps) = lookup("MCPCHAT_MAX_STEPS") {
            self.max_steps = parse_env_number("MCPCHAT_MAX_STEPS", &steps)?;
        }
        Ok(())
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(ChatError::Configuration("max_steps must be at least 1".into()));
        }
        if self.history_window == Some(0) {
            return Err(ChatError::Configuration(
                "history_window must be at least 1".into(),
            ));
        }
        if self.chunk_size == 0 || self.queue_capacity == 0 {
            return Err(ChatError::Configuration(
                "chunk_size and queue_capacity must be positive".into(),
            ));
        }
        if self.tool_timeout_secs == 0 {
            return Err(ChatError::Configuration(
                "tool_timeout_secs must be positive".into(),
            ));
        }

        let pattern = Regex::new(SERVER_NAME_PATTERN)
            .map_err(|e| ChatError::Configuration(e.to_string()))?;
        let mut seen = std::collections::HashSet::new();
        for server in &self.mcp_servers {
            if !pattern.is_match(&server.name) || server.name.contains("__") {
                return Err(ChatError::Configuration(format!(
                    "invalid MCP server name '{}': use letters, digits, '-' or '_' and no '__'",
                    server.name
                )));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ChatError::Configuration(format!(
                    "duplicate MCP server name '{}'",
                    server.name
                )));
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: self.system_prompt.clone(),
            ..GenerationSettings::default()
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions::builder()
            .max_steps(self.max_steps)
            .maybe_history_window(self.history_window)
            .retry(self.retry_policy())
            .settings(self.generation_settings())
            .stream(self.stream)
            .build()
    }
}

/// `<config dir>/mcpchat/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mcpchat").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_env_number(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| ChatError::Configuration(format!("{key} must be a positive integer, got '{value}'")))
}
