//! Inference backend trait and implementations.

pub mod http;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::tools::ToolDescriptor;
use crate::types::{ContentBlock, GenerationSettings, InferenceMessage, Role, TextStreamDelta, Turn};

/// Everything a backend needs for one model step.
#[derive(Debug, Clone, Default)]
pub struct InferenceRequest {
    /// Conversation so far, oldest first.
    pub history: Vec<Turn>,
    /// New user input for this step; empty on follow-up steps.
    pub prompt: String,
    /// Tools the model may call. Empty when the backend has no tool support.
    pub tools: Vec<ToolDescriptor>,
    pub settings: GenerationSettings,
}

impl InferenceRequest {
    /// Whether `prompt` still has to be sent as its own user message.
    ///
    /// The orchestrator appends the prompt to the history before calling the
    /// backend, so it is only sent separately when it is not already the last
    /// user turn.
    pub fn prompt_pending(&self) -> bool {
        if self.prompt.is_empty() {
            return false;
        }
        match self.history.last() {
            Some(turn) if turn.role == Role::User && !turn.is_tool_response() => {
                turn.text() != self.prompt.trim()
            }
            _ => true,
        }
    }
}

/// Core trait implemented by all inference backends.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Backend name (e.g. "ollama").
    fn name(&self) -> &str;

    /// The model this instance serves.
    fn model_id(&self) -> &str;

    /// Whether a tool catalog may be sent with requests.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Run one step and return the complete message.
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceMessage>;

    /// Run one step, streaming text as it is produced.
    ///
    /// Tool calls are delivered whole as `ToolCallDelta` events; a final
    /// `Done` event carries usage.
    async fn generate_stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>>;
}

/// Create a backend from a `<provider>:<model>` string.
pub fn create_provider(model: &str, config: &ChatConfig) -> Result<Arc<dyn InferenceProvider>> {
    let (provider, model_id) = model
        .split_once(':')
        .filter(|(p, m)| !p.is_empty() && !m.is_empty())
        .ok_or_else(|| {
            ChatError::Configuration(format!(
                "invalid model format '{model}', expected <provider>:<model>"
            ))
        })?;

    match provider {
        #[cfg(feature = "ollama")]
        "ollama" => Ok(Arc::new(ollama::OllamaProvider::new(
            model_id,
            config.ollama.base_url.clone(),
        ))),
        #[cfg(feature = "openai-compatible")]
        "openai" => Ok(Arc::new(openai_compatible::OpenAiCompatibleProvider::new(
            model_id,
            config.openai.api_key.clone(),
            config.openai.base_url.clone(),
        ))),
        other => Err(ChatError::Configuration(format!(
            "unsupported provider '{other}'"
        ))),
    }
}

/// Text of all tool results in a turn, for backends that send each result as
/// a `tool` message.
pub(crate) fn tool_result_messages(turn: &Turn) -> impl Iterator<Item = (&str, String)> {
    turn.content.iter().filter_map(|block| match block {
        ContentBlock::ToolResult(result) => Some((result.tool_use_id.as_str(), result.text())),
        _ => None,
    })
}
