//! OpenAI-compatible Chat Completions backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::tools::ToolArguments;
use crate::types::*;

use super::http::{drain_lines, error_from_response, json_headers, parse_sse_data, shared_client};
use super::{tool_result_messages, InferenceProvider, InferenceRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatibleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request_body(&self, request: &InferenceRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.settings.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for turn in &request.history {
            messages.extend(turn_to_openai(turn));
        }
        if request.prompt_pending() {
            messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        if let Some(max) = request.settings.max_tokens {
            body["max_tokens"] = max.into();
        }
        if let Some(temp) = request.settings.temperature {
            body["temperature"] = temp.into();
        }
        if let Some(top_p) = request.settings.top_p {
            body["top_p"] = top_p.into();
        }
        if let Some(seed) = request.settings.seed {
            body["seed"] = seed.into();
        }
        if let Some(ref stops) = request.settings.stop_sequences {
            body["stop"] = serde_json::json!(stops);
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema.to_json(),
                        }
                    })
                })
                .collect();
            body["tools"] = tool_defs.into();
        }

        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let resp = shared_client()
            .post(format!("{}/chat/completions", self.base_url))
            .headers(json_headers(self.api_key.as_deref()))
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        Ok(resp)
    }
}

#[async_trait]
impl InferenceProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceMessage> {
        let body = self.build_request_body(request, false);
        debug!(model = %self.model, "openai generate");

        let data: ChatResponse = self.post(&body).await?.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::provider("openai", "no choices in response"))?;

        let mut message = InferenceMessage::assistant(choice.message.content.unwrap_or_default())
            .with_usage(data.usage.map(Usage::from).unwrap_or_default());
        for call in choice.message.tool_calls.unwrap_or_default() {
            message = message.with_tool_call(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: ToolArguments::normalize(serde_json::Value::String(call.function.arguments)),
            });
        }
        Ok(message)
    }

    async fn generate_stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        let body = self.build_request_body(request, true);
        debug!(model = %self.model, "openai generate_stream");

        let byte_stream = self.post(&body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut pending: BTreeMap<u32, PartialToolCall> = BTreeMap::new();
            let mut usage = None;
            futures::pin_mut!(byte_stream);

            'outer: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChatError::Network(e));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    if line.starts_with(':') {
                        continue;
                    }
                    if line == "data: [DONE]" || line == "data:[DONE]" {
                        break 'outer;
                    }
                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let chunk = match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable chunk");
                            continue;
                        }
                    };
                    if let Some(error) = chunk.error {
                        yield Ok(TextStreamDelta::error(error.to_string()));
                        return;
                    }
                    if let Some(u) = chunk.usage {
                        usage = Some(Usage::from(u));
                    }
                    for choice in chunk.choices {
                        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                            yield Ok(TextStreamDelta::text(text));
                        }
                        for delta in choice.delta.tool_calls.unwrap_or_default() {
                            pending.entry(delta.index).or_default().absorb(delta);
                        }
                        if choice.finish_reason.is_some() {
                            for (_, call) in std::mem::take(&mut pending) {
                                yield Ok(TextStreamDelta::tool_call(call.finish()));
                            }
                        }
                    }
                }
            }

            for (_, call) in pending {
                yield Ok(TextStreamDelta::tool_call(call.finish()));
            }
            yield Ok(TextStreamDelta::done(usage));
        };

        Ok(Box::pin(stream))
    }
}

/// Tool call assembled from streamed fragments.
#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn absorb(&mut self, delta: StreamToolCall) {
        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            self.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> ToolCall {
        ToolCall {
            id: if self.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4())
            } else {
                self.id
            },
            name: self.name,
            arguments: ToolArguments::normalize(serde_json::Value::String(self.arguments)),
        }
    }
}

fn turn_to_openai(turn: &Turn) -> Vec<serde_json::Value> {
    let mut messages: Vec<serde_json::Value> = tool_result_messages(turn)
        .map(|(id, text)| {
            serde_json::json!({ "role": "tool", "tool_call_id": id, "content": text })
        })
        .collect();

    let text = turn.text();
    let tool_uses = turn.tool_uses();
    if text.is_empty() && tool_uses.is_empty() {
        return messages;
    }

    match turn.role {
        Role::Assistant if !tool_uses.is_empty() => {
            let calls: Vec<serde_json::Value> = tool_uses
                .iter()
                .map(|tu| {
                    let arguments = match &tu.arguments {
                        serde_json::Value::String(raw) => raw.clone(),
                        other => other.to_string(),
                    };
                    serde_json::json!({
                        "id": tu.id,
                        "type": "function",
                        "function": { "name": tu.name, "arguments": arguments },
                    })
                })
                .collect();
            messages.push(serde_json::json!({
                "role": "assistant",
                "content": if text.is_empty() { serde_json::Value::Null } else { text.into() },
                "tool_calls": calls,
            }));
        }
        Role::Assistant => messages.push(serde_json::json!({ "role": "assistant", "content": text })),
        Role::User | Role::Tool => messages.push(serde_json::json!({ "role": "user", "content": text })),
    }
    messages
}

// Chat Completions response types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage::new(u.prompt_tokens, u.completion_tokens)
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
