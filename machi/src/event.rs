//! Event types emitted by a streaming run.
//!
//! [`Event`] is the closed-but-extensible set of normalised events the SSE
//! normaliser (`model::sse`) produces from wire frames and the stream
//! buffer (`stream_buffer`) delivers to a consumer, in emission order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::Usage;

/// A normalised streaming event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Event {
    /// The remote has created a response object; the turn has begun.
    ResponseCreated {
        /// Id assigned by the remote to this response.
        response_id: String,
        /// Model that will service this response.
        model: String,
        /// Unix timestamp (seconds) of creation.
        created_at: i64,
    },

    /// An incremental fragment of assistant text output.
    TextDelta {
        /// The text fragment.
        text: String,
        /// Index of the content part this fragment belongs to.
        index: u32,
    },

    /// An incremental fragment of a function call's JSON arguments.
    FunctionCallArgumentsDelta {
        /// The function-call id the fragment belongs to.
        call_id: String,
        /// The arguments text fragment.
        #[serde(rename = "arguments")]
        arguments_fragment: String,
        /// Index of the output item this fragment belongs to.
        index: u32,
    },

    /// A new tool (function) call has been announced by the model.
    ToolCall {
        /// Name of the function being called.
        name: String,
        /// Id of this function call.
        call_id: String,
        /// Arguments accumulated so far (may be incomplete until the
        /// corresponding `function_call_arguments.done` frame, which is
        /// itself suppressed per the SSE mapping table).
        arguments: String,
    },

    /// The response has completed; usage is final for this turn.
    ResponseCompleted {
        /// Final usage for this turn.
        usage: Usage,
        /// Trace id of the owning run, if tracing is enabled.
        trace_id: Option<String>,
    },

    /// The stream's terminal `[DONE]` sentinel was received.
    StreamComplete,

    /// A usage figure arrived outside of a `response.completed` frame.
    UsageUpdate {
        /// The usage reported.
        usage: Usage,
    },

    /// A wire event whose `type` was not recognised.
    Unknown {
        /// The raw wire payload, preserved for diagnostics.
        raw: Value,
    },
}

impl Event {
    /// Returns `true` if this event terminates the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamComplete)
    }
}
