//! SSE normaliser — wire frames to [`crate::event::Event`] variants.
//!
//! [`frame`] turns a `reqwest::Response` body into a stream of raw JSON
//! payloads using `eventsource-stream`'s `data: ...\n\n` framing; [`normalise`]
//! is the pure mapping-table function from one such payload to an `Event`,
//! used both here and by the Runner when folding a streaming turn into an
//! accumulated [`crate::model::Response`].

use futures::{Stream, StreamExt, TryStreamExt};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::event::Event;
use crate::usage::Usage;

/// Wrap a `reqwest::Response` body in SSE framing, yielding one raw JSON
/// payload per `data: ...` frame. The `[DONE]` sentinel becomes
/// `{"type": "done"}`; a frame whose body is not valid JSON is skipped.
pub fn frame(response: reqwest::Response) -> impl Stream<Item = Result<Value>> {
    let byte_stream = response
        .bytes_stream()
        .map_err(|err| AgentError::NetworkError { underlying: err.to_string() });

    eventsource_stream::Eventsource::eventsource(byte_stream)
        .filter_map(|frame| async move {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => return Some(Err(AgentError::NetworkError { underlying: err.to_string() })),
            };

            if frame.data == "[DONE]" {
                return Some(Ok(serde_json::json!({"type": "done"})));
            }

            serde_json::from_str::<Value>(&frame.data).ok().map(Ok)
        })
}

/// Map one raw wire event payload to a normalised [`Event`], following the
/// mapping table: unrecognised or explicitly-suppressed wire types yield
/// `None` only for the suppressed cases; anything genuinely unrecognised
/// becomes `Event::Unknown`.
#[must_use]
pub fn normalise(raw: &Value) -> Option<Event> {
    match raw["type"].as_str()? {
        "response.created" => Some(Event::ResponseCreated {
            response_id: raw["response"]["id"].as_str().unwrap_or_default().to_owned(),
            model: raw["response"]["model"].as_str().unwrap_or_default().to_owned(),
            created_at: raw["response"]["created_at"].as_i64().unwrap_or_default(),
        }),
        "response.in_progress" | "response.function_call_arguments.done" | "response.output_item.done" => None,
        "response.output_text.delta" => Some(Event::TextDelta {
            text: raw["delta"].as_str().unwrap_or_default().to_owned(),
            index: raw["content_index"].as_u64().unwrap_or_default() as u32,
        }),
        "response.function_call_arguments.delta" => Some(Event::FunctionCallArgumentsDelta {
            call_id: raw["item_id"].as_str().unwrap_or_default().to_owned(),
            arguments_fragment: raw["delta"].as_str().unwrap_or_default().to_owned(),
            index: raw["output_index"].as_u64().unwrap_or_default() as u32,
        }),
        "response.output_item.added" if raw["item"]["type"] == "function_call" => Some(Event::ToolCall {
            name: raw["item"]["name"].as_str().unwrap_or_default().to_owned(),
            call_id: raw["item"]["id"].as_str().unwrap_or_default().to_owned(),
            arguments: raw["item"]["arguments"].as_str().unwrap_or_default().to_owned(),
        }),
        "response.output_item.added" => None,
        "response.completed" | "response.done" => {
            let usage = raw["response"]["usage"].clone();
            let usage: Usage = serde_json::from_value(usage).unwrap_or_default();
            Some(Event::ResponseCompleted {
                usage,
                trace_id: raw["response"]["trace_id"].as_str().map(str::to_owned),
            })
        }
        "done" => Some(Event::StreamComplete),
        _ => Some(Event::Unknown { raw: raw.clone() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_created_maps_fields() {
        let raw = serde_json::json!({
            "type": "response.created",
            "response": {"id": "resp_1", "model": "gpt-4o", "created_at": 1700}
        });
        match normalise(&raw).unwrap() {
            Event::ResponseCreated { response_id, model, created_at } => {
                assert_eq!(response_id, "resp_1");
                assert_eq!(model, "gpt-4o");
                assert_eq!(created_at, 1700);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn output_text_delta_maps_to_text_delta() {
        let raw = serde_json::json!({"type": "response.output_text.delta", "delta": "hi", "content_index": 0});
        match normalise(&raw).unwrap() {
            Event::TextDelta { text, index } => {
                assert_eq!(text, "hi");
                assert_eq!(index, 0);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn in_progress_is_suppressed() {
        let raw = serde_json::json!({"type": "response.in_progress"});
        assert!(normalise(&raw).is_none());
    }

    #[test]
    fn function_call_arguments_done_is_suppressed() {
        let raw = serde_json::json!({"type": "response.function_call_arguments.done"});
        assert!(normalise(&raw).is_none());
    }

    #[test]
    fn output_item_added_function_call_maps_to_tool_call() {
        let raw = serde_json::json!({
            "type": "response.output_item.added",
            "item": {"type": "function_call", "id": "c1", "name": "add", "arguments": ""}
        });
        match normalise(&raw).unwrap() {
            Event::ToolCall { name, call_id, .. } => {
                assert_eq!(name, "add");
                assert_eq!(call_id, "c1");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn done_sentinel_maps_to_stream_complete() {
        let raw = serde_json::json!({"type": "done"});
        assert!(matches!(normalise(&raw), Some(Event::StreamComplete)));
    }

    #[test]
    fn unrecognised_type_becomes_unknown() {
        let raw = serde_json::json!({"type": "response.something.new", "foo": 1});
        match normalise(&raw).unwrap() {
            Event::Unknown { raw: r } => assert_eq!(r["foo"], 1),
            _ => panic!("wrong variant"),
        }
    }
}
