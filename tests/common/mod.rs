//! Shared test helpers and scripted provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use mcpchat::agent_loop::{Orchestrator, OrchestratorOptions};
use mcpchat::error::{ChatError, Result, ToolError};
use mcpchat::provider::{InferenceProvider, InferenceRequest};
use mcpchat::session::SessionStore;
use mcpchat::sink::{StreamReceiver, StreamSink};
use mcpchat::tools::{InputSchema, LocalConnector, LocalTool, ToolOutput, ToolRouter};
use mcpchat::types::{InferenceMessage, TextStreamDelta, ToolCall, Usage};

/// One scripted backend reply.
pub enum Step {
    Reply(InferenceMessage),
    Fail(Box<dyn Fn() -> ChatError + Send + Sync>),
}

/// A provider that replays queued replies and records every request.
///
/// When the queue runs dry it answers "done", or never answers at all when
/// built with [`ScriptedProvider::stalling`].
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<InferenceRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    stall_when_empty: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            stall_when_empty: false,
        }
    }

    pub fn stalling() -> Self {
        Self {
            stall_when_empty: true,
            ..Self::new()
        }
    }

    /// Wait `delay` before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply(self, text: &str) -> Self {
        self.push(Step::Reply(
            InferenceMessage::assistant(text).with_usage(Usage::new(10, 20)),
        ))
    }

    pub fn tool_call(self, id: &str, name: &str, arguments: serde_json::Value) -> Self {
        self.push(Step::Reply(
            InferenceMessage::assistant("")
                .with_tool_call(ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                })
                .with_usage(Usage::new(10, 5)),
        ))
    }

    pub fn message(self, message: InferenceMessage) -> Self {
        self.push(Step::Reply(message))
    }

    pub fn fail(self, error: impl Fn() -> ChatError + Send + Sync + 'static) -> Self {
        self.push(Step::Fail(Box::new(error)))
    }

    /// Queue `count` overload failures.
    pub fn overloaded(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.fail(|| ChatError::api(529, r#"{"type":"error","error":{"type":"overloaded_error"}}"#));
        }
        self
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn next(&self, request: &InferenceRequest) -> Result<InferenceMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(message)) => Ok(message),
            Some(Step::Fail(error)) => Err(error()),
            None if self.stall_when_empty => futures::future::pending().await,
            None => Ok(InferenceMessage::assistant("done")),
        }
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceMessage> {
        self.next(request).await
    }

    async fn generate_stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>> {
        let message = self.next(request).await?;

        // Deliver text in two deltas so consumers see incremental output.
        let mut deltas = Vec::new();
        let mid = message
            .text
            .char_indices()
            .nth(message.text.chars().count() / 2)
            .map(|(idx, _)| idx)
            .unwrap_or(message.text.len());
        let (head, tail) = message.text.split_at(mid);
        for part in [head, tail] {
            if !part.is_empty() {
                deltas.push(Ok(TextStreamDelta::text(part)));
            }
        }
        for call in message.tool_calls {
            deltas.push(Ok(TextStreamDelta::tool_call(call)));
        }
        deltas.push(Ok(TextStreamDelta::done(Some(message.usage))));
        Ok(Box::pin(futures::stream::iter(deltas)))
    }
}

/// Router with a `calc` server exposing `add` and a `slow` tool that sleeps.
pub async fn calculator_router(timeout: Duration) -> ToolRouter {
    let connector = LocalConnector::new()
        .with_tool(LocalTool::new(
            "add",
            "Add two numbers",
            InputSchema::object()
                .number("a", "left", true)
                .number("b", "right", true)
                .build(),
            |args| async move {
                let a = args.get_f64("a").unwrap_or_default();
                let b = args.get_f64("b").unwrap_or_default();
                Ok(ToolOutput::text((a + b).to_string()))
            },
        ))
        .with_tool(LocalTool::new(
            "slow",
            "Sleeps for a minute",
            InputSchema::empty(),
            |_args| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ToolOutput::text("finally"))
            },
        ))
        .with_tool(LocalTool::new(
            "fail",
            "Always fails",
            InputSchema::empty(),
            |_args| async move {
                Err(ToolError::Execution {
                    tool: "fail".into(),
                    message: "boom".into(),
                })
            },
        ));

    let mut router = ToolRouter::new(timeout);
    router
        .register("calc", Arc::new(connector))
        .await
        .expect("register calc");
    router
}

pub fn orchestrator(
    provider: Arc<ScriptedProvider>,
    router: ToolRouter,
    options: OrchestratorOptions,
) -> Orchestrator {
    Orchestrator::new(
        provider,
        Arc::new(router),
        Arc::new(SessionStore::new()),
        options,
    )
}

/// A roomy sink pair for tests that read output after the run.
pub fn sink() -> (StreamSink, StreamReceiver) {
    mcpchat::sink::channel(64, 100)
}

/// Drain every fragment left in `receiver`.
pub async fn collect(mut receiver: StreamReceiver) -> Vec<String> {
    let mut fragments = Vec::new();
    while let Some(fragment) = receiver.recv().await {
        fragments.push(fragment);
    }
    fragments
}
