//! Generation settings and inference results.

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::message::Role;
use super::usage::Usage;

/// Settings forwarded to the inference backend.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: Option<u64>,
    pub stop_sequences: Option<Vec<String>>,
    /// System prompt prepended by backends that support one.
    pub system: Option<String>,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The message returned by one inference call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceMessage {
    pub role: Role,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Set when the backend echoes a tool response rather than generating.
    #[serde(default)]
    pub is_tool_response: bool,
    #[serde(default)]
    pub usage: Usage,
}

impl InferenceMessage {
    /// A plain assistant reply.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            tool_calls: Vec::new(),
            is_tool_response: false,
            usage: Usage::default(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}
