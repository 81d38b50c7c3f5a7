//! Configuration files and server lists.

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use mcpchat::config::{ChatConfig, McpServerConfig, DEFAULT_MODEL};
use mcpchat::error::ChatError;

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn toml_file_overrides_defaults() {
    let file = write_temp(
        r#"
model = "openai:gpt-4o-mini"
stream = false
history_window = 12
tool_timeout_secs = 15

[retry]
max_retries = 2
initial_backoff_ms = 250

[openai]
base_url = "http://localhost:8080/v1"

[[mcp_servers]]
name = "fs"
url = "http://localhost:3001/mcp"

[[mcp_servers]]
name = "web-search"
url = "http://localhost:3002/mcp"
timeout_secs = 5
"#,
        ".toml",
    );

    let config = ChatConfig::from_file(file.path()).unwrap();
    assert_eq!(config.model, "openai:gpt-4o-mini");
    assert!(!config.stream);
    assert_eq!(config.history_window, Some(12));
    assert_eq!(config.tool_timeout(), Duration::from_secs(15));
    assert_eq!(config.openai.base_url.as_deref(), Some("http://localhost:8080/v1"));
    assert_eq!(config.mcp_servers.len(), 2);
    assert_eq!(config.mcp_servers[1].timeout_secs, Some(5));
    config.validate().unwrap();

    let policy = config.retry_policy();
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.initial_backoff, Duration::from_millis(250));
    assert_eq!(policy.max_backoff, Duration::from_secs(30));

    let options = config.orchestrator_options();
    assert_eq!(options.history_window, Some(12));
    assert!(!options.stream);
}

#[test]
fn empty_file_yields_defaults() {
    let file = write_temp("", ".toml");
    let config = ChatConfig::from_file(file.path()).unwrap();
    assert_eq!(config, ChatConfig::default());
    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.max_steps, 20);
    assert_eq!(config.chunk_size, 100);
    assert_eq!(config.queue_capacity, 10);
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_temp("model = [unclosed", ".toml");
    assert!(matches!(
        ChatConfig::from_file(file.path()),
        Err(ChatError::ConfigParse(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(ChatConfig::load(Some(&path)), Err(ChatError::Io(_))));
}

#[test]
fn json_server_list_is_loaded() {
    let file = write_temp(
        r#"[
            {"name": "fs", "url": "http://localhost:3001/mcp"},
            {"name": "git", "url": "http://localhost:3003/mcp", "timeout_secs": 10}
        ]"#,
        ".json",
    );
    let servers = McpServerConfig::load_json(file.path()).unwrap();
    assert_eq!(
        servers,
        vec![
            McpServerConfig::new("fs", "http://localhost:3001/mcp"),
            McpServerConfig {
                timeout_secs: Some(10),
                ..McpServerConfig::new("git", "http://localhost:3003/mcp")
            },
        ]
    );
}

#[test]
fn server_names_must_be_usable_as_namespaces() {
    for bad in ["my__fs", "has space", "", "dot.ted"] {
        let config = ChatConfig {
            mcp_servers: vec![McpServerConfig::new(bad, "http://localhost/mcp")],
            ..ChatConfig::default()
        };
        assert!(
            matches!(config.validate(), Err(ChatError::Configuration(_))),
            "{bad:?} should be rejected"
        );
    }

    let duplicate = ChatConfig {
        mcp_servers: vec![
            McpServerConfig::new("fs", "http://a/mcp"),
            McpServerConfig::new("fs", "http://b/mcp"),
        ],
        ..ChatConfig::default()
    };
    assert!(matches!(duplicate.validate(), Err(ChatError::Configuration(_))));
}

#[test]
fn environment_overrides_apply_through_lookup() {
    let mut config = ChatConfig::default();
    config
        .apply_env(|key| match key {
            "MCPCHAT_MODEL" => Some("openai:gpt-4.1".into()),
            "OPENAI_API_KEY" => Some("sk-test".into()),
            "MCPCHAT_HISTORY_WINDOW" => Some("8".into()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.model, "openai:gpt-4.1");
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.history_window, Some(8));

    let err = config
        .apply_env(|key| (key == "MCPCHAT_MAX_STEPS").then(|| "many".into()))
        .unwrap_err();
    assert!(err.to_string().contains("MCPCHAT_MAX_STEPS"));
}
