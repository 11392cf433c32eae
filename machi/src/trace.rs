//! Tracing hooks — optional lifecycle notifications and span export.
//!
//! [`RunHooks`] observes every agent in a run; [`AgentHooks`] is bound to a
//! single agent. Both follow the teacher's dual-layer hooks pattern
//! (`callback::hooks`): every method has a no-op default, so callers
//! override only the events they care about. Neither trait can influence
//! control flow — a hook that panics is the caller's bug, not the engine's
//! concern, so the Runner never inspects a hook's return value beyond
//! awaiting it.
//!
//! [`Trace`] and [`Span`] are the entities the Runner builds up as a run
//! progresses; when tracing is enabled, [`Exporter`] batches and ships them
//! to the tracing ingest endpoint in the background.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::error::AgentError;

/// A boxed, thread-safe [`RunHooks`] trait object.
pub type BoxedRunHooks = Arc<dyn RunHooks>;

/// A boxed, thread-safe [`AgentHooks`] trait object.
pub type BoxedAgentHooks = Arc<dyn AgentHooks>;

/// Global run-level lifecycle hooks, observing every agent in a run.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called before an agent begins its turn loop.
    async fn on_agent_start(&self, _ctx: &RunContext, _agent_name: &str) {}

    /// Called after an agent produces its final output.
    async fn on_agent_end(&self, _ctx: &RunContext, _agent_name: &str, _output: &Value) {}

    /// Called just before invoking the model.
    async fn on_llm_start(&self, _ctx: &RunContext, _agent_name: &str) {}

    /// Called immediately after the model responds.
    async fn on_llm_end(&self, _ctx: &RunContext, _agent_name: &str, _usage: &crate::usage::Usage) {}

    /// Called immediately before a tool is invoked.
    async fn on_tool_start(&self, _ctx: &RunContext, _agent_name: &str, _tool_name: &str) {}

    /// Called immediately after a tool completes.
    async fn on_tool_end(&self, _ctx: &RunContext, _agent_name: &str, _tool_name: &str, _result: &str) {}

    /// Called when control hands off from one agent to another.
    async fn on_handoff(&self, _ctx: &RunContext, _from_agent: &str, _to_agent: &str) {}

    /// Called when the run terminates with an error.
    async fn on_error(&self, _ctx: &RunContext, _agent_name: &str, _error: &AgentError) {}
}

/// Per-agent lifecycle hooks, bound to a specific agent instance.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called before this agent begins its turn loop.
    async fn on_start(&self, _ctx: &RunContext) {}

    /// Called after this agent produces its final output.
    async fn on_end(&self, _ctx: &RunContext, _output: &Value) {}

    /// Called just before invoking the model for this agent.
    async fn on_llm_start(&self, _ctx: &RunContext) {}

    /// Called immediately after the model responds for this agent.
    async fn on_llm_end(&self, _ctx: &RunContext, _usage: &crate::usage::Usage) {}

    /// Called immediately before a tool is invoked by this agent.
    async fn on_tool_start(&self, _ctx: &RunContext, _tool_name: &str) {}

    /// Called immediately after a tool completes for this agent.
    async fn on_tool_end(&self, _ctx: &RunContext, _tool_name: &str, _result: &str) {}

    /// Called when this agent hands off control to another agent.
    async fn on_handoff(&self, _ctx: &RunContext, _to_agent: &str) {}

    /// Called when this agent's execution ends in an error.
    async fn on_error(&self, _ctx: &RunContext, _error: &AgentError) {}
}

/// A no-op [`RunHooks`], used when tracing/hooks are not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunHooks;

#[async_trait]
impl RunHooks for NoopRunHooks {}

/// A no-op [`AgentHooks`], used when tracing/hooks are not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAgentHooks;

#[async_trait]
impl AgentHooks for NoopAgentHooks {}

/// The kind of operation a [`Span`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    /// An agent's whole turn loop.
    Agent,
    /// A single tool invocation.
    Function,
    /// One model call.
    Generation,
    /// One HTTP response from the model endpoint.
    Response,
    /// A handoff between agents.
    Handoff,
    /// A guardrail check.
    Guardrail,
    /// An alias of `function`, kept distinct for tool-specific filtering.
    Tool,
    /// A raw outbound HTTP request.
    ApiRequest,
}

/// One recorded operation within a [`Trace`].
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    /// This span's id, formatted `span_<hex>`.
    pub id: String,
    /// Id of the owning trace.
    pub trace_id: String,
    /// Kind of operation this span records.
    #[serde(rename = "type")]
    pub span_type: SpanType,
    /// Arbitrary structured data describing the operation.
    pub data: Value,
    /// Unix timestamp (seconds) when the span started.
    pub start: i64,
    /// Unix timestamp (seconds) when the span ended, if it has.
    pub end: Option<i64>,
    /// Structured result of the operation, once ended.
    pub result: Option<Value>,
}

/// The full record of one run, owning its spans.
///
/// Spans never outlive their trace: they are stored inline on the
/// [`Trace`] they belong to rather than tracked independently.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    /// This trace's id, formatted `trace_<hex>`.
    pub id: String,
    /// Groups traces from the same logical run together, e.g. across
    /// handoffs; formatted `group_<hex>`.
    pub group_id: String,
    /// Name of the agent the trace started on.
    pub agent: String,
    /// Unix timestamp (seconds) when the trace started.
    pub start: i64,
    /// Unix timestamp (seconds) when the trace ended, if it has.
    pub end: Option<i64>,
    /// Spans recorded during this trace, in start order.
    pub spans: Vec<Span>,
    /// Free-form context captured at trace start.
    pub context: Value,
    /// Structured result of the run, once ended.
    pub result: Option<Value>,
}

fn hex_id(prefix: &str) -> String {
    format!("{prefix}_{:016x}{:016x}", fastrand::u64(..), fastrand::u64(..))
}

impl Trace {
    /// Start a new trace for `agent`, generating a fresh id and group id.
    #[must_use]
    pub fn start(agent: impl Into<String>, context: Value, now: i64) -> Self {
        Self {
            id: hex_id("trace"),
            group_id: hex_id("group"),
            agent: agent.into(),
            start: now,
            end: None,
            spans: Vec::new(),
            context,
            result: None,
        }
    }

    /// Begin a new span on this trace, returning its id.
    pub fn record_span(&mut self, span_type: SpanType, data: Value, now: i64) -> String {
        let id = hex_id("span");
        self.spans.push(Span {
            id: id.clone(),
            trace_id: self.id.clone(),
            span_type,
            data,
            start: now,
            end: None,
            result: None,
        });
        id
    }

    /// Close a span previously opened with [`Trace::record_span`].
    pub fn end_span(&mut self, span_id: &str, result: Value, now: i64) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.id == span_id) {
            span.end = Some(now);
            span.result = Some(result);
        }
    }

    /// Close the trace itself.
    pub fn end(&mut self, result: Value, now: i64) {
        self.end = Some(now);
        self.result = Some(result);
    }
}

/// Payload POSTed to the tracing ingest endpoint.
#[derive(Debug, Serialize)]
struct IngestBody<'a> {
    traces: &'a [Trace],
    exported_at: String,
}

/// Background batching exporter for completed traces.
///
/// Traces are queued with [`Exporter::submit`] and flushed either when
/// `batch_size` accumulates or `batch_timeout` elapses, whichever comes
/// first. A flush that fails with a 5xx or network error is retried with
/// exponential backoff (base 1s, capped at 3 attempts) before the batch is
/// dropped; this retry loop is the one place the engine itself retries,
/// rather than surfacing the failure to the caller.
pub struct Exporter {
    sender: mpsc::UnboundedSender<Trace>,
}

impl Exporter {
    /// Spawn the background exporter task, POSTing batches to
    /// `{base_url}/traces/ingest`.
    #[must_use]
    pub fn spawn(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self::spawn_with(client, base_url, api_key, Duration::from_secs(5), 100)
    }

    /// Like [`Exporter::spawn`], with explicit batching parameters.
    #[must_use]
    pub fn spawn_with(
        client: reqwest::Client,
        base_url: String,
        api_key: String,
        batch_timeout: Duration,
        batch_size: usize,
    ) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Trace>();

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let mut interval = tokio::time::interval(batch_timeout);
            interval.tick().await;

            loop {
                tokio::select! {
                    maybe_trace = receiver.recv() => {
                        match maybe_trace {
                            Some(trace) => {
                                batch.push(trace);
                                if batch.len() >= batch_size {
                                    flush(&client, &base_url, &api_key, &mut batch).await;
                                }
                            }
                            None => {
                                flush(&client, &base_url, &api_key, &mut batch).await;
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        flush(&client, &base_url, &api_key, &mut batch).await;
                    }
                }
            }
        });

        Self { sender }
    }

    /// Queue a completed trace for export. Never blocks the caller.
    pub fn submit(&self, trace: Trace) {
        let _ = self.sender.send(trace);
    }
}

fn iso8601_now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    // Unix epoch seconds rendered as an ISO-8601 UTC instant, without
    // pulling in a dedicated date/time crate for one timestamp field.
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let (hour, min, sec) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    let (year, month, day) = civil_from_days(days as i64);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

// Howard Hinnant's days-from-civil algorithm, inverted; avoids a chrono/time
// dependency for the single exported_at field the ingest endpoint wants.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}

async fn flush(client: &reqwest::Client, base_url: &str, api_key: &str, batch: &mut Vec<Trace>) {
    if batch.is_empty() {
        return;
    }

    let body = IngestBody {
        traces: batch,
        exported_at: iso8601_now(),
    };

    let mut delay = Duration::from_secs(1);
    for attempt in 0..3 {
        let response = client
            .post(format!("{base_url}/traces/ingest"))
            .bearer_auth(api_key)
            .header("OpenAI-Beta", "traces=v1")
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => break,
            Ok(resp) if resp.status().is_server_error() && attempt < 2 => {
                tracing::warn!(status = %resp.status(), attempt, "trace export failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "trace export failed, dropping batch");
                break;
            }
            Err(err) if attempt < 2 => {
                tracing::warn!(error = %err, attempt, "trace export network error, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => {
                tracing::warn!(error = %err, "trace export failed, dropping batch");
                break;
            }
        }
    }

    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_id_has_expected_prefix_and_length() {
        let id = hex_id("trace");
        assert!(id.starts_with("trace_"));
        assert_eq!(id.len(), "trace_".len() + 32);
    }

    #[test]
    fn trace_lifecycle_records_spans() {
        let mut trace = Trace::start("triage", serde_json::json!({}), 1000);
        let span_id = trace.record_span(SpanType::Generation, serde_json::json!({"model": "gpt-4o"}), 1000);
        trace.end_span(&span_id, serde_json::json!({"ok": true}), 1001);
        trace.end(serde_json::json!({"output": "pong"}), 1002);

        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].end, Some(1001));
        assert_eq!(trace.end, Some(1002));
    }

    #[tokio::test]
    async fn noop_hooks_do_not_panic() {
        let hooks = NoopRunHooks;
        let ctx = RunContext::new();
        hooks.on_agent_start(&ctx, "triage").await;
        hooks.on_agent_end(&ctx, "triage", &Value::Null).await;

        let agent_hooks = NoopAgentHooks;
        agent_hooks.on_start(&ctx).await;
    }
}
