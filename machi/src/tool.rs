//! Tool trait and registry for agent function calling.
//!
//! Tools are the primary way agents act on the world: a user-supplied
//! implementation of [`Tool`], registered into a [`ToolBox`] on the agent,
//! is exposed to the model as a JSON-Schema function and invoked by the
//! dispatcher (`dispatch`) when the model requests it by name.
//!
//! # OpenAI API Alignment
//!
//! [`ToolDefinition`] serialises to `{"type": "function", "function": {...}}`,
//! matching the `tools` array of the Responses API request body (§6).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RunContext;

/// Error produced by a single tool invocation.
///
/// Unlike [`crate::error::AgentError`], a `ToolError` never aborts a run by
/// itself: the dispatcher (`dispatch::dispatch`) catches it and serialises
/// it into the corresponding `function_call_output` item so the model can
/// see and recover from the failure.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The model supplied arguments that did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// No tool with the requested name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool's own logic failed.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The per-call timeout elapsed before the tool returned.
    #[error("timeout")]
    Timeout,

    /// The tool's task panicked.
    #[error("tool panicked: {0}")]
    Panicked(String),
}

/// Definition of a tool for LLM function calling.
///
/// Serialises to OpenAI's function-calling format:
/// ```json
/// {"type": "function", "function": {"name": ..., "description": ..., "parameters": {...}}}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ToolDefinition {
    /// Name of the tool (e.g. `"add"`).
    pub name: String,
    /// Description shown to the model to help it decide when to call this.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

impl Serialize for ToolDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut function = serde_json::Map::new();
        function.insert("name".to_owned(), Value::String(self.name.clone()));
        function.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        function.insert("parameters".to_owned(), self.parameters.clone());

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// A tool an agent may invoke, addressed by name with JSON arguments.
///
/// Implementations are object-safe so they can be stored as `Arc<dyn Tool>`
/// inside a [`ToolBox`] and invoked concurrently by the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool. Must be unique within an
    /// agent's tool list and must not start with `handoff_to_` (reserved
    /// for synthetic handoff shims, see [`crate::handoff`]).
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> String;

    /// JSON Schema for this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with already-decoded JSON arguments.
    ///
    /// `context` is a read-only view of the run's [`RunContext`]: tools may
    /// inspect accumulated usage or metadata but cannot mutate engine state.
    async fn execute(&self, args: Value, context: &RunContext) -> Result<Value, ToolError>;

    /// Transform an execution error before it is reported, e.g. to mask
    /// an internal error message. The default passes the error through.
    fn on_error(&self, error: &ToolError) -> String {
        error.to_string()
    }

    /// Build this tool's [`ToolDefinition`] for the request's `tools` array.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }
}

/// A shared, type-erased tool handle.
pub type BoxedTool = Arc<dyn Tool>;

/// A named collection of tools configured on an agent.
#[derive(Default, Clone)]
pub struct ToolBox {
    tools: HashMap<String, BoxedTool>,
}

impl ToolBox {
    /// Create an empty toolbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn add(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_owned(), Arc::new(tool));
    }

    /// Register an already-boxed tool.
    pub fn add_boxed(&mut self, tool: BoxedTool) {
        self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    /// All tool definitions, for inclusion in a model request.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Names of all registered tools.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.values().map(|t| t.name()).collect()
    }

    /// `true` if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBox")
            .field("tools", &self.names())
            .finish_non_exhaustive()
    }
}
