//! Orchestrator: drives model steps and tool dispatch for one prompt.

use std::collections::HashSet;
use std::sync::Arc;

use bon::Builder;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result, ToolError};
use crate::provider::{InferenceProvider, InferenceRequest};
use crate::session::{SessionKey, SessionStore};
use crate::sink::StreamSink;
use crate::tools::{ToolArguments, ToolRouter};
use crate::types::{
    ContentBlock, GenerationSettings, InferenceMessage, Role, StreamEventType, ToolResult, ToolUse,
    Turn,
};
use crate::util::retry::RetryPolicy;

use super::compaction::compact;
use super::types::{LoopState, RunSummary};

/// Default cap on model steps per run.
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Knobs for an [`Orchestrator`].
#[derive(Debug, Clone, Builder)]
pub struct OrchestratorOptions {
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    /// Turns kept after each successful run. `None` disables compaction.
    pub history_window: Option<usize>,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub settings: GenerationSettings,
    /// Use the backend's streaming endpoint.
    #[builder(default = true)]
    pub stream: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Runs prompts against a backend with tool access.
///
/// One orchestrator serves any number of sessions; runs on different
/// sessions proceed in parallel, runs on the same session are serialized.
pub struct Orchestrator {
    provider: Arc<dyn InferenceProvider>,
    router: Arc<ToolRouter>,
    sessions: Arc<SessionStore>,
    options: OrchestratorOptions,
}

/// Tool results of one step.
struct DispatchOutcome {
    results: Vec<ToolResult>,
    /// At least one call got past routing to a connector.
    reached_connector: bool,
    canceled: bool,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        router: Arc<ToolRouter>,
        sessions: Arc<SessionStore>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            provider,
            router,
            sessions,
            options,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn router(&self) -> &Arc<ToolRouter> {
        &self.router
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run `prompt` on the session for `key`, streaming into `sink`.
    ///
    /// The session is created on first use and locked for the whole run.
    /// Dropping `sink` at the end closes the consumer's stream.
    pub async fn run_turn(
        &self,
        key: &SessionKey,
        prompt: &str,
        sink: StreamSink,
    ) -> Result<RunSummary> {
        let handle = self.sessions.get_or_create(key);
        let mut session = handle.lock().await;

        info!(session = %key, model = self.provider.model_id(), "starting turn");
        let result = self.run_on_history(&mut session.history, prompt, &sink).await;
        match &result {
            Ok(summary) => info!(
                session = %key,
                steps = summary.steps,
                tool_calls = summary.tool_calls,
                input_tokens = summary.usage.input_tokens,
                output_tokens = summary.usage.output_tokens,
                "turn complete"
            ),
            Err(e) => warn!(
                session = %key,
                state = %LoopState::for_error(e),
                error = %e,
                "turn ended early"
            ),
        }
        result
    }

    /// Run the loop on a caller-owned history.
    ///
    /// Turns appended before an error stay in `history`.
    pub async fn run_on_history(
        &self,
        history: &mut Vec<Turn>,
        prompt: &str,
        sink: &StreamSink,
    ) -> Result<RunSummary> {
        let cancel = sink.cancellation_token().clone();
        if !prompt.is_empty() {
            history.push(Turn::user(prompt));
        }

        let tools = if self.provider.supports_tools() {
            self.router.catalog().to_vec()
        } else {
            Vec::new()
        };

        let mut summary = RunSummary::default();
        let mut step_prompt = prompt.to_string();

        loop {
            if cancel.is_cancelled() {
                return Err(ChatError::Canceled);
            }
            if summary.steps >= self.options.max_steps {
                return Err(ChatError::MaxStepsExceeded {
                    max_steps: self.options.max_steps,
                });
            }
            summary.steps += 1;
            summary.state = LoopState::AwaitingModel;

            let request = InferenceRequest {
                history: history.clone(),
                prompt: std::mem::take(&mut step_prompt),
                tools: tools.clone(),
                settings: self.options.settings.clone(),
            };
            debug!(step = summary.steps, history = history.len(), "requesting model step");

            let message = {
                let request = &request;
                let cancel = &cancel;
                self.options
                    .retry
                    .execute(cancel, move || self.infer(request, sink, cancel))
                    .await?
            };
            summary.usage.merge(&message.usage);
            summary.text = message.text.clone();

            let assistant = assistant_turn(&message, history.as_slice());
            let tool_uses: Vec<ToolUse> = assistant.tool_uses().into_iter().cloned().collect();
            if !assistant.content.is_empty() {
                history.push(assistant);
            }

            if tool_uses.is_empty() {
                break;
            }

            summary.state = LoopState::DispatchingTools;
            summary.tool_calls += tool_uses.len();
            debug!(step = summary.steps, calls = tool_uses.len(), "dispatching tool calls");

            let outcome = self.dispatch_all(&tool_uses, sink, &cancel).await;
            history.push(Turn::tool_results(outcome.results));
            if outcome.canceled {
                return Err(ChatError::Canceled);
            }
            if !outcome.reached_connector {
                info!(step = summary.steps, "no tool call could be routed, ending run");
                break;
            }
        }

        summary.state = LoopState::Done;
        if let Some(window) = self.options.history_window {
            *history = compact(history, window);
        }
        Ok(summary)
    }

    /// One backend call, forwarding text to `sink` as it arrives.
    async fn infer(
        &self,
        request: &InferenceRequest,
        sink: &StreamSink,
        cancel: &CancellationToken,
    ) -> Result<InferenceMessage> {
        if !self.options.stream {
            let message = tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Canceled),
                result = self.provider.generate(request) => result?,
            };
            if !message.text.is_empty() && !sink.send(&message.text).await {
                return Err(ChatError::Canceled);
            }
            return Ok(message);
        }

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Canceled),
            stream = self.provider.generate_stream(request) => stream?,
        };

        let mut message = InferenceMessage::assistant("");
        loop {
            let delta = tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Canceled),
                delta = stream.next() => delta,
            };
            let Some(delta) = delta else { break };
            let delta = delta?;
            match delta.event_type {
                StreamEventType::TextDelta => {
                    if delta.text.is_empty() {
                        continue;
                    }
                    message.text.push_str(&delta.text);
                    if !sink.send(&delta.text).await {
                        return Err(ChatError::Canceled);
                    }
                }
                StreamEventType::ToolCallDelta => {
                    if let Some(call) = delta.tool_call {
                        message.tool_calls.push(call);
                    }
                }
                StreamEventType::Done => {
                    if let Some(usage) = delta.usage {
                        message.usage = usage;
                    }
                    break;
                }
                StreamEventType::Error => {
                    let text = if delta.text.is_empty() {
                        "stream error".to_string()
                    } else {
                        delta.text
                    };
                    return Err(ChatError::Stream(text));
                }
            }
        }
        Ok(message)
    }

    /// Dispatch every call of one step, in order.
    async fn dispatch_all(
        &self,
        tool_uses: &[ToolUse],
        sink: &StreamSink,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome {
            results: Vec::with_capacity(tool_uses.len()),
            reached_connector: false,
            canceled: false,
        };

        for tool_use in tool_uses {
            if outcome.canceled || cancel.is_cancelled() {
                outcome.canceled = true;
                let err = ToolError::Canceled {
                    tool: tool_use.name.clone(),
                };
                outcome.results.push(ToolResult::error(&tool_use.id, err.to_string()));
                continue;
            }

            match self
                .router
                .dispatch(&tool_use.name, &tool_use.arguments, cancel)
                .await
            {
                Ok(output) => {
                    outcome.reached_connector = true;
                    for text in output.text_fragments() {
                        if !sink.send(text).await {
                            outcome.canceled = true;
                            break;
                        }
                    }
                    outcome
                        .results
                        .push(ToolResult::success(&tool_use.id, output.content));
                }
                Err(err) => {
                    if matches!(err, ToolError::Canceled { .. }) {
                        outcome.canceled = true;
                    }
                    outcome.reached_connector |= !err.is_routing_error();
                    outcome
                        .results
                        .push(ToolResult::error(&tool_use.id, err.to_string()));
                }
            }
        }
        outcome
    }
}

/// Build the assistant turn for a model message.
///
/// Tool calls get a fresh `call_<uuid>` id when theirs is missing or repeats
/// any call already in `history` or earlier in the same step, so ids stay
/// unique across the session. Argument payloads are normalized.
fn assistant_turn(message: &InferenceMessage, history: &[Turn]) -> Turn {
    let mut content = Vec::with_capacity(message.tool_calls.len() + 1);
    if !message.text.trim().is_empty() {
        content.push(ContentBlock::text(message.text.clone()));
    }

    let mut seen: HashSet<String> = history
        .iter()
        .flat_map(|turn| turn.tool_uses())
        .map(|tool_use| tool_use.id.clone())
        .collect();
    for call in &message.tool_calls {
        let id = if call.id.is_empty() || seen.contains(&call.id) {
            format!("call_{}", uuid::Uuid::new_v4())
        } else {
            call.id.clone()
        };
        seen.insert(id.clone());
        content.push(ContentBlock::ToolUse(ToolUse {
            id,
            name: call.name.clone(),
            arguments: ToolArguments::normalize(call.arguments.clone()),
        }));
    }
    Turn::new(Role::Assistant, content)
}
