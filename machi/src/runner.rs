//! Runner — the turn-loop state machine driving one agent run end-to-end.
//!
//! One [`Runner`] services exactly one `run`/`stream` call. It owns the run
//! state (`agent`, `context`, `conversation`, `turn`, usage, trace) for its
//! whole lifetime and is never shared across runs.
//!
//! Grounded most directly on the orphaned `agent/runner.rs`'s `RunState`
//! struct and `process_step` method in the teacher's snapshot, which already
//! implements the turn-by-turn `init → step → step → ...` shape shared
//! between the blocking and streaming paths. This module keeps that
//! structure — a state struct advanced turn-by-turn by a single
//! `process_turn` method called from both [`Runner::run`] and
//! [`Runner::run_streamed`] — while implementing this crate's own true
//! handoff re-targeting and sequential output-guardrail semantics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::agent::Agent;
use crate::config::ApiConfig;
use crate::context::RunContext;
use crate::dispatch::{self, PendingCall};
use crate::error::{AgentError, Result};
use crate::event::Event;
use crate::guardrail;
use crate::handoff;
use crate::item::{Conversation, Item};
use crate::model::{self, OutputItem, Request};
use crate::stream_buffer::{self, NextEvent, StreamConsumer};
use crate::trace::{BoxedRunHooks, NoopRunHooks, SpanType, Trace};
use crate::usage::Usage;

/// Default synchronous-run aggregate timeout.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(60);
/// Default maximum number of model turns before `MaxTurnsExceeded`.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Tunables for one `run`/`stream` call.
#[derive(Debug, Clone)]
pub struct RunOptions {
    max_turns: usize,
    tool_timeout: Duration,
    timeout: Duration,
    previous_response_id: Option<String>,
}

impl RunOptions {
    /// Override `max_turns`.
    ///
    /// # Errors
    /// Returns [`AgentError::InvalidConfig`] if `max_turns` is zero.
    pub fn with_max_turns(mut self, max_turns: usize) -> Result<Self> {
        if max_turns == 0 {
            return Err(AgentError::invalid_config("max_turns", "must be at least 1"));
        }
        self.max_turns = max_turns;
        Ok(self)
    }

    /// Override the per-tool-call timeout.
    #[must_use]
    pub const fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Override the aggregate synchronous-run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forward a remote-provided `previous_response_id` on the first turn.
    /// Does not change the Runner's own authoritative local conversation.
    #[must_use]
    pub fn with_previous_response_id(mut self, id: impl Into<String>) -> Self {
        self.previous_response_id = Some(id.into());
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tool_timeout: dispatch::DEFAULT_TOOL_TIMEOUT,
            timeout: DEFAULT_RUN_TIMEOUT,
            previous_response_id: None,
        }
    }
}

/// The outcome of a completed, non-streaming run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The final, guardrail-validated text output.
    pub output: String,
    /// Cumulative usage across every turn (and every agent, across handoffs).
    pub usage: Usage,
    /// Trace id of the run, if tracing was enabled.
    pub trace_id: Option<String>,
    /// Id of the last model response received.
    pub response_id: Option<String>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

#[derive(Debug)]
enum Outcome {
    Terminate(String),
    Continue,
}

/// Owns and advances one run's state from start to termination.
pub struct Runner {
    agent: Agent,
    context: RunContext,
    conversation: Conversation,
    max_turns: usize,
    tool_timeout: Duration,
    run_timeout: Duration,
    previous_response_id: Option<String>,
    response_id: Option<String>,
    config: ApiConfig,
    trace: Option<Trace>,
    run_hooks: BoxedRunHooks,
    start: Instant,
}

impl Runner {
    /// Start a new run of `agent` against `input`, using `config` to reach
    /// the Responses endpoint.
    #[must_use]
    pub fn new(agent: Agent, input: Conversation, config: ApiConfig, options: RunOptions) -> Self {
        let trace = if config.tracing_disabled() {
            None
        } else {
            Some(Trace::start(agent.name(), serde_json::Value::Null, now()))
        };

        Self {
            agent,
            context: RunContext::new(),
            conversation: input,
            max_turns: options.max_turns,
            tool_timeout: options.tool_timeout,
            run_timeout: options.timeout,
            previous_response_id: options.previous_response_id,
            response_id: None,
            config,
            trace,
            run_hooks: Arc::new(NoopRunHooks),
            start: Instant::now(),
        }
    }

    /// Attach run-level hooks, replacing the default no-op implementation.
    #[must_use]
    pub fn with_run_hooks(mut self, hooks: BoxedRunHooks) -> Self {
        self.run_hooks = hooks;
        self
    }

    /// Drive the run to completion synchronously, bounded by the
    /// configured aggregate `timeout`.
    ///
    /// # Errors
    /// See `AgentError` variants; any failure aborts the run.
    #[instrument(skip(self), fields(agent = %self.agent.name()))]
    pub async fn run(mut self) -> Result<RunResult> {
        let timeout = self.run_timeout;
        match tokio::time::timeout(timeout, self.drive(None)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AgentError::NetworkError {
                underlying: "run exceeded aggregate timeout".to_owned(),
            }),
        }
    }

    /// Drive the run on a background task, forwarding every event to a
    /// [`StreamConsumer`] the caller pulls from. Dropping the returned
    /// consumer does not stop the background task; callers that need
    /// cancellation should hold the returned `JoinHandle` and `abort()` it.
    #[must_use]
    pub fn stream(mut self) -> (tokio::task::JoinHandle<Result<RunResult>>, StreamConsumer) {
        let (producer, consumer) = stream_buffer::channel();
        let handle = tokio::spawn(async move {
            let result = self.drive(Some(producer.clone())).await;
            producer.complete();
            result
        });
        (handle, consumer)
    }

    async fn drive(&mut self, stream: Option<crate::stream_buffer::StreamProducer>) -> Result<RunResult> {
        self.run_hooks.on_agent_start(&self.context, self.agent.name()).await;
        self.agent.hooks().on_start(&self.context).await;

        let result = loop {
            match self.check_turn_limit() {
                Ok(()) => {}
                Err(err) => break Err(err),
            }

            match self.process_turn(stream.as_ref()).await {
                Ok(Outcome::Terminate(output)) => {
                    self.run_hooks
                        .on_agent_end(&self.context, self.agent.name(), &serde_json::Value::String(output.clone()))
                        .await;
                    break Ok(RunResult {
                        output,
                        usage: self.context.usage().clone(),
                        trace_id: self.trace.as_ref().map(|t| t.id.clone()),
                        response_id: self.response_id.clone(),
                        duration: self.start.elapsed(),
                    });
                }
                Ok(Outcome::Continue) => continue,
                Err(err) => break Err(err),
            }
        };

        if let Err(err) = &result {
            self.run_hooks.on_error(&self.context, self.agent.name(), err).await;
            self.agent.hooks().on_error(&self.context, err).await;
        }

        if let Some(trace) = &mut self.trace {
            let result_json = match &result {
                Ok(r) => serde_json::json!({"output": r.output}),
                Err(e) => serde_json::json!({"error": e.to_string()}),
            };
            trace.end(result_json, now());
        }

        result
    }

    fn check_turn_limit(&self) -> Result<()> {
        if self.context.turn() >= self.max_turns {
            return Err(AgentError::MaxTurnsExceeded { turns: self.context.turn() });
        }
        Ok(())
    }

    async fn process_turn(
        &mut self,
        stream: Option<&crate::stream_buffer::StreamProducer>,
    ) -> Result<Outcome> {
        guardrail::run_input_guardrails(
            self.agent.input_guardrails(),
            &self.context,
            self.agent.name(),
            &self.conversation,
        )
        .await?;

        let response = match stream {
            Some(producer) => self.call_model_streaming(producer).await?,
            None => self.call_model().await?,
        };

        self.response_id = Some(response.id.clone());
        self.context.update_usage(response.usage.clone());

        self.classify(response.output).await
    }

    fn build_request(&self, stream: bool) -> Request {
        let mut tools: Vec<_> = self.agent.tools().definitions();
        tools.extend(self.agent.handoffs().iter().map(handoff::Handoff::definition));

        let mut request = Request::new(self.agent.model().unwrap_or("gpt-4o").to_owned());
        request.instructions = Some(self.agent.instructions(&self.context));
        request.input = self.conversation.items().to_vec();
        request.tools = tools;
        request.stream = stream;
        request.model_settings = self.agent.model_settings().clone();
        if self.context.turn() == 0 {
            request.previous_response_id = self.previous_response_id.clone();
        }
        request
    }

    async fn call_model(&mut self) -> Result<model::Response> {
        debug!(turn = self.context.turn(), "calling model");
        let request = self.build_request(false);
        model::create_completion(&request, &self.config).await
    }

    async fn call_model_streaming(
        &mut self,
        producer: &crate::stream_buffer::StreamProducer,
    ) -> Result<model::Response> {
        let request = self.build_request(true);
        let mut raw_stream = Box::pin(model::create_stream(request, &self.config).await?);

        let mut text = String::new();
        let mut calls: Vec<(String, String, String)> = Vec::new(); // (call_id, name, arguments)
        let mut usage = Usage::default();
        let mut response_id = String::new();
        let mut model_name = String::new();
        let mut created_at = 0_i64;

        use futures::StreamExt;
        while let Some(frame) = raw_stream.next().await {
            let raw = frame?;
            let Some(event) = model::sse::normalise(&raw) else { continue };

            match &event {
                Event::ResponseCreated { response_id: id, model, created_at: ts } => {
                    response_id.clone_from(id);
                    model_name.clone_from(model);
                    created_at = *ts;
                }
                Event::TextDelta { text: delta, .. } => text.push_str(delta),
                Event::ToolCall { name, call_id, arguments } => {
                    calls.push((call_id.clone(), name.clone(), arguments.clone()));
                }
                Event::FunctionCallArgumentsDelta { call_id, arguments_fragment, .. } => {
                    if let Some(call) = calls.iter_mut().find(|(id, ..)| id == call_id) {
                        call.2.push_str(arguments_fragment);
                    }
                }
                Event::ResponseCompleted { usage: final_usage, .. } => usage = final_usage.clone(),
                Event::StreamComplete => {}
                Event::Unknown { .. } | Event::UsageUpdate { .. } => {}
            }

            let terminal = event.is_terminal();
            producer.emit(event);
            if terminal {
                break;
            }
        }

        let mut output = Vec::new();
        if !text.is_empty() {
            output.push(OutputItem::Text(text));
        }
        for (call_id, name, arguments) in calls {
            output.push(OutputItem::FunctionCall { call_id, name, arguments });
        }

        Ok(model::Response {
            id: response_id,
            model: model_name,
            created_at,
            usage,
            output,
        })
    }

    async fn classify(&mut self, output: Vec<OutputItem>) -> Result<Outcome> {
        let mut text_parts = Vec::new();
        let mut calls = Vec::new();
        let mut handoff_target: Option<String> = None;

        for item in output {
            match item {
                OutputItem::Text(text) => text_parts.push(text),
                OutputItem::FunctionCall { call_id, name, arguments } => calls.push((call_id, name, arguments)),
                OutputItem::Handoff { target } => handoff_target = handoff_target.or(Some(target)),
                OutputItem::Other(_) => {}
            }
        }

        // Function calls take precedence over bare text in the same response.
        if !calls.is_empty() {
            let call_pairs: Vec<(String, serde_json::Value)> = calls
                .iter()
                .map(|(_, name, args)| {
                    (
                        name.clone(),
                        serde_json::from_str(args).unwrap_or(serde_json::Value::Null),
                    )
                })
                .collect();

            if let Some(resolved) = handoff::resolve(self.agent.handoffs(), &call_pairs) {
                let handoff = resolved.handoff.clone();
                return Ok(self.apply_handoff(&handoff).await);
            }

            if let Some((_, name, _)) = calls.iter().find(|(_, name, _)| name.starts_with(handoff::HANDOFF_PREFIX)) {
                return Err(AgentError::HandoffError {
                    reason: format!("unknown handoff target in call '{name}': no matching configured handoff"),
                });
            }

            return self.dispatch_tool_calls(calls).await;
        }

        // A bare `handoff` item (as opposed to a `handoff_to_*` function
        // call) carries only a target agent name; resolve it against the
        // agent's own configured handoffs the same way §4.H does.
        if let Some(target) = handoff_target {
            if let Some(handoff) = self.agent.handoffs().iter().find(|h| h.target() == target).cloned() {
                return Ok(self.apply_handoff(&handoff).await);
            }

            return Err(AgentError::HandoffError {
                reason: format!("unresolved handoff target '{target}': no matching configured handoff"),
            });
        }

        if !text_parts.is_empty() {
            let joined = text_parts.join("");
            let validated = guardrail::run_output_guardrails(
                self.agent.output_guardrails(),
                &self.context,
                self.agent.name(),
                serde_json::Value::String(joined),
            )
            .await?;
            let output = validated.as_str().unwrap_or_default().to_owned();
            self.conversation.push(Item::Text { text: output.clone() });
            return Ok(Outcome::Terminate(output));
        }

        Err(AgentError::UnexpectedResponse {
            message: "model response contained no text, function calls, or handoff".to_owned(),
        })
    }

    /// Switch the Runner to `handoff`'s target agent, applying its input
    /// filter to the conversation carried across and resetting the turn
    /// counter for the new agent.
    async fn apply_handoff(&mut self, handoff: &handoff::Handoff) -> Outcome {
        let target_agent = (**handoff.agent()).clone();
        let target_name = target_agent.name().to_owned();
        let filtered = handoff.apply_filter(std::mem::take(&mut self.conversation));

        self.run_hooks.on_handoff(&self.context, self.agent.name(), &target_name).await;
        self.agent.hooks().on_handoff(&self.context, &target_name).await;

        self.agent = target_agent;
        self.conversation = filtered;
        self.context.reset_turn();
        Outcome::Continue
    }

    async fn dispatch_tool_calls(&mut self, calls: Vec<(String, String, String)>) -> Result<Outcome> {
        let pending: Vec<PendingCall> = calls
            .iter()
            .map(|(call_id, name, arguments)| PendingCall {
                name: name.clone(),
                call_id: call_id.clone(),
                arguments: arguments.clone(),
            })
            .collect();

        for (call_id, name, arguments) in &calls {
            self.conversation.push(Item::FunctionCall {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            });
            self.run_hooks.on_tool_start(&self.context, self.agent.name(), name).await;
            self.agent.hooks().on_tool_start(&self.context, name).await;
        }

        let span_id = self.trace.as_mut().map(|t| {
            t.record_span(SpanType::Function, serde_json::json!({"calls": calls.len()}), now())
        });

        let outputs = dispatch::dispatch(&pending, self.agent.tools(), &self.context, self.tool_timeout).await;

        if let (Some(trace), Some(span_id)) = (&mut self.trace, &span_id) {
            trace.end_span(span_id, serde_json::json!({"completed": outputs.len()}), now());
        }

        for (output, (_, name, _)) in outputs.iter().zip(calls.iter()) {
            if let Item::FunctionCallOutput { output: result, .. } = output {
                self.run_hooks.on_tool_end(&self.context, self.agent.name(), name, result).await;
                self.agent.hooks().on_tool_end(&self.context, name, result).await;
            }
        }

        self.conversation.extend(outputs);

        self.context.advance_turn();
        Ok(Outcome::Continue)
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Drain a [`StreamConsumer`] until [`NextEvent::Done`], logging anything
/// unexpected. Used by the public façade's `stream` wrapper.
pub async fn drain_one(consumer: &mut StreamConsumer, timeout: Duration) -> Option<Event> {
    match consumer.next(timeout).await {
        NextEvent::Event(event) => Some(event),
        NextEvent::Done => None,
        NextEvent::TimedOut => {
            warn!("stream consumer timed out waiting for next event");
            None
        }
    }
}
