//! Model adapter — wire-level access to the Responses HTTP endpoint.
//!
//! [`Request`]/[`Response`] model the JSON bodies of `POST {base_url}/responses`;
//! [`create_completion`] performs a single non-streaming call, [`create_stream`]
//! opens a Server-Sent-Events stream and yields normalised [`crate::event::Event`]s
//! via the [`sse`] submodule.
//!
//! Grounded on the teacher's `llms/openai/client.rs` (shared `reqwest::Client`,
//! bearer-auth header construction, config-driven URL building) and `chat.rs`
//! (builder-pattern request struct with a custom `Serialize` that omits `None`
//! fields) — the request/response *types* are authored fresh to match the
//! Responses API shape rather than the teacher's Chat-Completions shape.

pub mod sse;

use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{AgentError, Result};
use crate::item::Item;
use crate::usage::Usage;

/// How the model should choose whether and which tool to call.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// `"auto"` or `"none"`.
    Mode(String),
    /// Force a specific named function.
    Named {
        /// Always `"function"`.
        #[serde(rename = "type")]
        kind: String,
        /// The forced function's descriptor.
        function: NamedFunction,
    },
}

impl ToolChoice {
    /// The `"auto"` tool-choice mode: the model decides.
    #[must_use]
    pub fn auto() -> Self {
        Self::Mode("auto".to_owned())
    }

    /// The `"none"` tool-choice mode: never call a tool.
    #[must_use]
    pub fn none() -> Self {
        Self::Mode("none".to_owned())
    }

    /// Force the model to call `name`.
    #[must_use]
    pub fn force(name: impl Into<String>) -> Self {
        Self::Named {
            kind: "function".to_owned(),
            function: NamedFunction { name: name.into() },
        }
    }
}

/// The function name a forced [`ToolChoice`] names.
#[derive(Debug, Clone, Serialize)]
pub struct NamedFunction {
    /// Name of the function to force.
    pub name: String,
}

/// The requested structured-output format, built from an agent's
/// `output_schema`.
#[derive(Debug, Clone, Serialize)]
pub struct TextFormat {
    /// Always `"json_schema"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Schema name, the last dotted component of the schema identifier.
    pub name: String,
    /// The JSON Schema itself.
    pub schema: Value,
}

/// A request body for `POST {base_url}/responses`.
///
/// Serialises with `None` fields omitted entirely, following the teacher's
/// `chat.rs` request-serialisation convention.
#[derive(Debug, Clone)]
pub struct Request {
    /// Model identifier, e.g. `"gpt-4o"`.
    pub model: String,
    /// System-level instructions for this turn.
    pub instructions: Option<String>,
    /// The conversation so far, as wire items.
    pub input: Vec<Item>,
    /// Function (and handoff-shim) tool definitions available this turn.
    pub tools: Vec<crate::tool::ToolDefinition>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f64>,
    /// How the model should pick a tool, if any.
    pub tool_choice: Option<ToolChoice>,
    /// Whether multiple tool calls may be requested in one response.
    pub parallel_tool_calls: Option<bool>,
    /// Whether to request a Server-Sent-Events stream.
    pub stream: bool,
    /// Requested structured-output format.
    pub text: Option<TextFormat>,
    /// Opt-in continuation hint; does not replace the locally tracked
    /// conversation.
    pub previous_response_id: Option<String>,
    /// Free-form model settings merged into the body verbatim, e.g. a
    /// caller-supplied `max_tokens`.
    pub model_settings: serde_json::Map<String, Value>,
}

impl Request {
    /// Start building a request for `model`.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions: None,
            input: Vec::new(),
            tools: Vec::new(),
            temperature: None,
            top_p: None,
            tool_choice: None,
            parallel_tool_calls: None,
            stream: false,
            text: None,
            previous_response_id: None,
            model_settings: serde_json::Map::new(),
        }
    }
}

impl Serialize for Request {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("model", &self.model)?;
        if let Some(instructions) = &self.instructions {
            map.serialize_entry("instructions", instructions)?;
        }
        map.serialize_entry("input", &self.input)?;
        if !self.tools.is_empty() {
            map.serialize_entry("tools", &self.tools)?;
        }
        if let Some(temperature) = self.temperature {
            map.serialize_entry("temperature", &temperature)?;
        }
        if let Some(top_p) = self.top_p {
            map.serialize_entry("top_p", &top_p)?;
        }
        if let Some(tool_choice) = &self.tool_choice {
            map.serialize_entry("tool_choice", tool_choice)?;
        }
        if let Some(parallel) = self.parallel_tool_calls {
            map.serialize_entry("parallel_tool_calls", &parallel)?;
        }
        map.serialize_entry("stream", &self.stream)?;
        if let Some(text) = &self.text {
            map.serialize_entry("text", &serde_json::json!({"format": text}))?;
        }
        if let Some(previous) = &self.previous_response_id {
            map.serialize_entry("previous_response_id", previous)?;
        }
        for (key, value) in &self.model_settings {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A normalised output item from a completed (or accumulated) response.
#[derive(Debug, Clone)]
pub enum OutputItem {
    /// Assistant text output.
    Text(String),
    /// A requested function call.
    FunctionCall {
        /// Id correlating this call to its eventual output.
        call_id: String,
        /// Name of the function being called.
        name: String,
        /// Arguments, as a JSON-encoded string.
        arguments: String,
    },
    /// A structured handoff item.
    Handoff {
        /// Name of the target agent.
        target: String,
    },
    /// Any other recognised-but-unmapped item, preserved verbatim.
    Other(Value),
}

/// A normalised response from the Responses endpoint.
#[derive(Debug, Clone)]
pub struct Response {
    /// Id assigned by the remote to this response.
    pub id: String,
    /// Model that serviced this response.
    pub model: String,
    /// Unix timestamp (seconds) of creation.
    pub created_at: i64,
    /// Token usage for this response.
    pub usage: Usage,
    /// Normalised output items, in wire order.
    pub output: Vec<OutputItem>,
}

impl Response {
    fn from_wire(raw: &Value) -> Result<Self> {
        let id = raw["id"].as_str().unwrap_or_default().to_owned();
        let model = raw["model"].as_str().unwrap_or_default().to_owned();
        let created_at = raw["created_at"].as_i64().unwrap_or_default();
        let usage = if raw["usage"].is_null() {
            Usage::default()
        } else {
            serde_json::from_value(raw["usage"].clone())?
        };

        let mut output = Vec::new();
        for item in raw["output"].as_array().into_iter().flatten() {
            output.extend(normalise_output_item(item));
        }

        Ok(Self {
            id,
            model,
            created_at,
            usage,
            output,
        })
    }
}

fn normalise_output_item(item: &Value) -> Vec<OutputItem> {
    match item["type"].as_str() {
        Some("message") => item["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|part| match part["type"].as_str() {
                Some("output_text") => {
                    Some(OutputItem::Text(part["text"].as_str().unwrap_or_default().to_owned()))
                }
                Some("tool_use") => Some(OutputItem::FunctionCall {
                    call_id: part["id"].as_str().unwrap_or_default().to_owned(),
                    name: part["name"].as_str().unwrap_or_default().to_owned(),
                    arguments: part["arguments"].as_str().unwrap_or_default().to_owned(),
                }),
                _ => None,
            })
            .collect(),
        Some("function_call") => vec![OutputItem::FunctionCall {
            call_id: item["call_id"]
                .as_str()
                .or_else(|| item["id"].as_str())
                .unwrap_or_default()
                .to_owned(),
            name: item["name"].as_str().unwrap_or_default().to_owned(),
            arguments: item["arguments"].as_str().unwrap_or_default().to_owned(),
        }],
        Some("handoff") => vec![OutputItem::Handoff {
            target: item["target"].as_str().unwrap_or_default().to_owned(),
        }],
        _ => vec![OutputItem::Other(item.clone())],
    }
}

fn build_client(config: &ApiConfig) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        format!("Bearer {}", config.api_key())
            .parse()
            .map_err(|_| AgentError::invalid_config("api_key", "contains invalid header characters"))?,
    );
    headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout())
        .build()
        .map_err(Into::into)
}

/// Perform a single, non-streaming call to `{base_url}/responses`.
///
/// # Errors
/// Returns [`AgentError::ApiError`] for a non-2xx response,
/// [`AgentError::NetworkError`] for a transport failure, or
/// [`AgentError::DecodeError`] for a malformed body.
pub async fn create_completion(request: &Request, config: &ApiConfig) -> Result<Response> {
    let client = build_client(config)?;
    let url = format!("{}/responses", config.base_url());

    let response = client.post(url).json(request).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AgentError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    let raw: Value = serde_json::from_str(&body)?;
    Response::from_wire(&raw)
}

/// Default per-HTTP-request timeout for a streaming call, matching §6's
/// "no aggregate timeout, only per-request timeouts" semantics for
/// streaming runs.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Open a Server-Sent-Events stream for `request` (forcing `stream: true`)
/// and yield each frame's raw JSON payload, or `{"type": "done"}` for the
/// `[DONE]` sentinel. Malformed frames are skipped rather than failing the
/// whole stream.
///
/// # Errors
/// The returned stream yields `Err` for a non-2xx initial response or a
/// transport failure opening the connection; a single malformed frame
/// mid-stream is silently skipped rather than erroring the stream.
pub async fn create_stream(
    mut request: Request,
    config: &ApiConfig,
) -> Result<impl Stream<Item = Result<Value>>> {
    request.stream = true;

    let client = build_client(config)?;
    let url = format!("{}/responses", config.base_url());

    let response = client
        .post(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .timeout(DEFAULT_STREAM_TIMEOUT)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::ApiError {
            status: status.as_u16(),
            body,
        });
    }

    Ok(sse::frame(response))
}
