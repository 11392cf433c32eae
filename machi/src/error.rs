//! Error types for the machi agent runtime.
//!
//! This module defines the single closed error type returned by every
//! fallible operation in the crate, carrying enough context to diagnose
//! a failed run without re-running it.

use serde_json::Value;

/// A type alias for `Result<T, AgentError>`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// The error type for all agent runtime operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AgentError {
    /// An input validator refused the turn's input before the model was called.
    #[error("input guardrail '{module}' triggered: {reason}")]
    GuardrailTriggered {
        /// Name of the guardrail that tripped.
        module: String,
        /// Human-readable refusal reason.
        reason: String,
        /// Structured metadata from the guardrail.
        meta: Value,
    },

    /// An output validator refused the turn's final output.
    #[error("output guardrail '{module}' triggered: {reason}")]
    OutputGuardrailTriggered {
        /// Name of the guardrail that tripped.
        module: String,
        /// Human-readable refusal reason.
        reason: String,
        /// Structured metadata from the guardrail.
        meta: Value,
        /// The output value that was rejected.
        output: Value,
    },

    /// The run reached `max_turns` without terminating.
    #[error("exceeded maximum turns ({turns})")]
    MaxTurnsExceeded {
        /// Number of turns taken before the run was aborted.
        turns: usize,
    },

    /// The remote Responses endpoint returned a non-2xx status.
    #[error("API error: status {status}, body: {body}")]
    ApiError {
        /// HTTP status code returned by the remote endpoint.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// A transport-level failure talking to the remote endpoint.
    #[error("network error: {underlying}")]
    NetworkError {
        /// Description of the underlying transport failure.
        underlying: String,
    },

    /// A JSON body or SSE frame could not be decoded.
    #[error("decode error: {underlying}")]
    DecodeError {
        /// Description of the decode failure.
        underlying: String,
    },

    /// A specific tool invocation failed.
    ///
    /// This does not by itself abort the run: it is serialised into the
    /// conversation as a `function_call_output` and the loop continues.
    /// It only escapes to the caller if no recovery path applies.
    #[error("tool '{name}' (call {call_id}) failed: {reason}")]
    ToolExecutionError {
        /// Name of the tool that failed.
        name: String,
        /// The function-call id this failure corresponds to.
        call_id: String,
        /// Failure reason, or `"timeout"` if the per-call deadline elapsed.
        reason: String,
    },

    /// A handoff function call named a target that is not registered.
    #[error("handoff error: {reason}")]
    HandoffError {
        /// Description of why the handoff could not be resolved.
        reason: String,
    },

    /// The model returned a response with no actionable output items.
    #[error("unexpected response: {message}")]
    UnexpectedResponse {
        /// Description of what was expected instead.
        message: String,
    },

    /// The agent configuration failed validation at run start.
    #[error("invalid config field '{field}': {reason}")]
    InvalidConfig {
        /// Name of the offending configuration field.
        field: String,
        /// Description of why the value is invalid.
        reason: String,
    },
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError {
            underlying: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError {
            underlying: err.to_string(),
        }
    }
}

impl AgentError {
    /// Create a new input-guardrail-triggered error.
    #[must_use]
    pub fn guardrail_triggered(
        module: impl Into<String>,
        reason: impl Into<String>,
        meta: impl Into<Value>,
    ) -> Self {
        Self::GuardrailTriggered {
            module: module.into(),
            reason: reason.into(),
            meta: meta.into(),
        }
    }

    /// Create a new output-guardrail-triggered error.
    #[must_use]
    pub fn output_guardrail_triggered(
        module: impl Into<String>,
        reason: impl Into<String>,
        meta: impl Into<Value>,
        output: impl Into<Value>,
    ) -> Self {
        Self::OutputGuardrailTriggered {
            module: module.into(),
            reason: reason.into(),
            meta: meta.into(),
            output: output.into(),
        }
    }

    /// Create a new tool execution error.
    #[must_use]
    pub fn tool_execution(
        name: impl Into<String>,
        call_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ToolExecutionError {
            name: name.into(),
            call_id: call_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid-config error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
