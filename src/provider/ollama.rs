//! Ollama local backend, native `/api/chat` endpoint.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ChatError, Result};
use crate::types::*;

use super::http::{drain_lines, error_from_response, json_headers, shared_client};
use super::{tool_result_messages, InferenceProvider, InferenceRequest};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    model: String,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request_body(&self, request: &InferenceRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.settings.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for turn in &request.history {
            messages.extend(turn_to_ollama(turn));
        }
        if request.prompt_pending() {
            messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
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
            body["tools"] = tools.into();
        }

        let mut options = serde_json::Map::new();
        if let Some(temp) = request.settings.temperature {
            options.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = request.settings.top_p {
            options.insert("top_p".into(), top_p.into());
        }
        if let Some(max) = request.settings.max_tokens {
            options.insert("num_predict".into(), max.into());
        }
        if let Some(seed) = request.settings.seed {
            options.insert("seed".into(), seed.into());
        }
        if let Some(ref stops) = request.settings.stop_sequences {
            options.insert("stop".into(), serde_json::json!(stops));
        }
        if !options.is_empty() {
            body["options"] = options.into();
        }

        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let resp = shared_client()
            .post(self.endpoint())
            .headers(json_headers(None))
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
impl InferenceProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceMessage> {
        let body = self.build_request_body(request, false);
        debug!(model = %self.model, messages = request.history.len(), "ollama generate");

        let data: OllamaChunk = self.post(&body).await?.json().await?;
        if let Some(error) = data.error {
            return Err(ChatError::provider("ollama", error));
        }

        let usage = data.usage();
        let message = data.message.unwrap_or_default();
        let mut result = InferenceMessage::assistant(message.content).with_usage(usage);
        for call in message.tool_calls {
            result = result.with_tool_call(call.into_tool_call());
        }
        Ok(result)
    }

    async fn generate_stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        let body = self.build_request_body(request, true);
        debug!(model = %self.model, messages = request.history.len(), "ollama generate_stream");

        let byte_stream = self.post(&body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;
            futures::pin_mut!(byte_stream);

            'outer: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChatError::Network(e));
                        break;
                    }
                };
                buffer.extend_from_slice(&chunk);

                for line in drain_lines(&mut buffer) {
                    let chunk = match serde_json::from_str::<OllamaChunk>(&line) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable ollama line");
                            continue;
                        }
                    };
                    if let Some(error) = chunk.error {
                        yield Ok(TextStreamDelta::error(error));
                        finished = true;
                        break 'outer;
                    }
                    let usage = chunk.usage();
                    if let Some(message) = chunk.message {
                        if !message.content.is_empty() {
                            yield Ok(TextStreamDelta::text(message.content));
                        }
                        for call in message.tool_calls {
                            yield Ok(TextStreamDelta::tool_call(call.into_tool_call()));
                        }
                    }
                    if chunk.done {
                        yield Ok(TextStreamDelta::done(Some(usage)));
                        finished = true;
                        break 'outer;
                    }
                }
            }

            if !finished {
                yield Ok(TextStreamDelta::done(None));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Convert one turn into zero or more Ollama chat messages.
fn turn_to_ollama(turn: &Turn) -> Vec<serde_json::Value> {
    let mut messages: Vec<serde_json::Value> = tool_result_messages(turn)
        .map(|(_, text)| serde_json::json!({ "role": "tool", "content": text }))
        .collect();

    let text = turn.text();
    let tool_uses = turn.tool_uses();
    if text.is_empty() && tool_uses.is_empty() {
        return messages;
    }

    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut message = serde_json::json!({ "role": role, "content": text });
    if !tool_uses.is_empty() {
        let calls: Vec<serde_json::Value> = tool_uses
            .iter()
            .map(|tu| {
                serde_json::json!({
                    "function": { "name": tu.name, "arguments": tu.arguments }
                })
            })
            .collect();
        message["tool_calls"] = calls.into();
    }
    messages.push(message);
    messages
}

// Ollama API response types (internal)

#[derive(Deserialize)]
struct OllamaChunk {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

impl OllamaChunk {
    fn usage(&self) -> Usage {
        Usage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

#[derive(Deserialize, Default)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl OllamaToolCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4())),
            name: self.function.name,
            arguments: self.function.arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_results_become_tool_messages() {
        let turn = Turn::tool_results(vec![
            ToolResult::success("a", vec![ToolContent::text("3")]),
            ToolResult::error("b", "server not found: calc"),
        ]);
        let messages = turn_to_ollama(&turn);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], json!({ "role": "tool", "content": "3" }));
        assert_eq!(messages[1]["content"], "server not found: calc");
    }

    #[test]
    fn assistant_tool_uses_are_forwarded() {
        let turn = Turn::new(
            Role::Assistant,
            vec![ContentBlock::ToolUse(ToolUse {
                id: "a".into(),
                name: "calc__add".into(),
                arguments: json!({"a": 1, "b": 2}),
            })],
        );
        let messages = turn_to_ollama(&turn);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(messages[0]["tool_calls"][0]["function"]["name"], "calc__add");
        assert_eq!(messages[0]["tool_calls"][0]["function"]["arguments"]["b"], 2);
    }

    #[test]
    fn empty_turns_are_skipped() {
        let turn = Turn::new(Role::Assistant, vec![]);
        assert!(turn_to_ollama(&turn).is_empty());
    }

    #[test]
    fn request_body_carries_tools_and_options() {
        let provider = OllamaProvider::new("llama3.1", Some("http://host:1/".into()));
        assert_eq!(provider.endpoint(), "http://host:1/api/chat");

        let request = InferenceRequest {
            history: vec![Turn::user("add 1 and 2")],
            prompt: "add 1 and 2".into(),
            tools: vec![crate::tools::ToolDescriptor::new(
                "calc__add",
                "Add numbers",
                crate::tools::InputSchema::object().number("a", "a", true).build(),
            )],
            settings: GenerationSettings {
                temperature: Some(0.2),
                max_tokens: Some(64),
                ..GenerationSettings::default()
            },
        };
        let body = provider.build_request_body(&request, true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "a");
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn missing_tool_call_ids_are_generated() {
        let call: OllamaToolCall =
            serde_json::from_value(json!({"function": {"name": "x__y", "arguments": {}}})).unwrap();
        assert!(call.into_tool_call().id.starts_with("call_"));
    }
}
