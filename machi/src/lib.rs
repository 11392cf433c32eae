#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(tail_expr_drop_order)]
//! An agent runtime for multi-turn LLM Responses-API conversations: a
//! turn-loop engine that calls out to a model, dispatches requested tool
//! calls in parallel, hands off between agents, and gates input/output
//! through a guardrail pipeline — either as a single blocking call or as a
//! live event stream.
//!
//! The [`run`], [`run_async`], and [`stream`] functions are the three
//! entry points; everything else in this crate configures what they drive.

extern crate self as machi;

pub mod agent;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod guardrail;
pub mod handoff;
pub mod item;
pub mod model;
pub mod runner;
pub mod stream_buffer;
pub mod tool;
pub mod trace;
pub mod usage;

pub mod prelude {
    //! Common imports for building and running agents.
    pub use crate::agent::{Agent, AgentBuilder, Instructions, OutputSchema};
    pub use crate::config::ApiConfig;
    pub use crate::context::{Context, RunContext};
    pub use crate::error::{AgentError, Result};
    pub use crate::event::Event;
    pub use crate::guardrail::{
        GuardrailOutput, InputGuardrail, InputGuardrailCheck, OutputGuardrail, OutputGuardrailCheck,
    };
    pub use crate::handoff::Handoff;
    pub use crate::item::{Conversation, Item, Role};
    pub use crate::runner::{RunOptions, RunResult};
    pub use crate::tool::{Tool, ToolBox, ToolDefinition, ToolError};
    pub use crate::usage::Usage;
    pub use crate::{run, run_async, stream};
}

use std::time::Duration;

use item::Conversation;
use runner::{RunOptions, RunResult, Runner};
use stream_buffer::StreamConsumer;

/// Run `agent` against `input` and block until it produces a result or
/// fails, bounded by `options`'s aggregate timeout.
///
/// # Errors
/// See [`error::AgentError`]; any failure aborts the run.
pub async fn run(
    agent: agent::Agent,
    input: impl Into<Conversation>,
    config: config::ApiConfig,
    options: RunOptions,
) -> error::Result<RunResult> {
    Runner::new(agent, input.into(), config, options).run().await
}

/// Start `agent` against `input` on a background task, returning a handle
/// that resolves to the same result `run` would. Dropping the handle
/// aborts the in-flight run.
#[must_use]
pub fn run_async(
    agent: agent::Agent,
    input: impl Into<Conversation>,
    config: config::ApiConfig,
    options: RunOptions,
) -> RunHandle {
    let conversation = input.into();
    let join = tokio::spawn(async move { Runner::new(agent, conversation, config, options).run().await });
    RunHandle { join: Some(join) }
}

/// Start `agent` against `input` on a background task and return a handle
/// to the event stream it produces. Dropping the handle aborts the run.
#[must_use]
pub fn stream(
    agent: agent::Agent,
    input: impl Into<Conversation>,
    config: config::ApiConfig,
    options: RunOptions,
) -> StreamHandle {
    let runner = Runner::new(agent, input.into(), config, options);
    let (join, consumer) = runner.stream();
    StreamHandle { join: Some(join), consumer }
}

/// A handle to a run started with [`run_async`].
///
/// Dropping this handle aborts the underlying task, matching the
/// `tokio::task::JoinHandle::abort` cancellation idiom used throughout the
/// crate's `tokio`-based plumbing.
#[derive(Debug)]
pub struct RunHandle {
    join: Option<tokio::task::JoinHandle<error::Result<RunResult>>>,
}

impl RunHandle {
    /// Wait for the run to finish.
    ///
    /// # Errors
    /// Returns the run's own error, or [`error::AgentError::UnexpectedResponse`]
    /// if the background task itself panicked or was cancelled.
    pub async fn join(mut self) -> error::Result<RunResult> {
        self.join
            .take()
            .expect("join handle is only taken here")
            .await
            .map_err(|_| error::AgentError::UnexpectedResponse {
                message: "run task panicked or was cancelled".to_owned(),
            })?
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// A handle to a streaming run started with [`stream`].
pub struct StreamHandle {
    join: Option<tokio::task::JoinHandle<error::Result<RunResult>>>,
    consumer: StreamConsumer,
}

impl StreamHandle {
    /// Pull the next event, waiting up to `timeout`. Returns `None` once
    /// the stream completes.
    pub async fn next(&mut self, timeout: Duration) -> Option<event::Event> {
        runner::drain_one(&mut self.consumer, timeout).await
    }

    /// Wait for the underlying run to finish after the stream has drained.
    ///
    /// # Errors
    /// Returns the run's own error, or [`error::AgentError::UnexpectedResponse`]
    /// if the background task itself panicked or was cancelled.
    pub async fn join(mut self) -> error::Result<RunResult> {
        self.join
            .take()
            .expect("join handle is only taken here")
            .await
            .map_err(|_| error::AgentError::UnexpectedResponse {
                message: "run task panicked or was cancelled".to_owned(),
            })?
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

impl From<&str> for Conversation {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<String> for Conversation {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}
