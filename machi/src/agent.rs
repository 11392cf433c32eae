//! Agent configuration — the read-only record the Runner executes.
//!
//! An [`Agent`] is immutable once built: the Runner never mutates it,
//! only reads `instructions`/`tools`/`handoffs`/guardrails/`output_schema`
//! once per turn. Construct one with [`AgentBuilder`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::handoff::Handoff;
use crate::tool::ToolBox;
use crate::trace::{AgentHooks, BoxedAgentHooks, NoopAgentHooks};

/// An agent's system-level instructions: a fixed string, or a function of
/// the current [`RunContext`] evaluated fresh each turn.
#[derive(Clone)]
pub enum Instructions {
    /// A fixed instructions string.
    Static(String),
    /// Computed from the run context at the start of each turn.
    Dynamic(Arc<dyn Fn(&RunContext) -> String + Send + Sync>),
}

impl Instructions {
    /// Resolve to a concrete string for this turn.
    #[must_use]
    pub fn resolve(&self, context: &RunContext) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Dynamic(func) => func(context),
        }
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Instructions {
    fn from(value: &str) -> Self {
        Self::Static(value.to_owned())
    }
}

impl From<String> for Instructions {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

/// A user-declared structured-output schema, forwarded verbatim to the
/// model adapter; the engine never parses or validates against it itself.
pub trait OutputSchema: Send + Sync {
    /// A stable schema-name string, used as the `text.format.name` field.
    fn name(&self) -> String;

    /// The JSON Schema describing the expected output shape.
    fn schema(&self) -> Value;
}

/// A configured, immutable agent.
#[derive(Clone)]
pub struct Agent {
    name: String,
    instructions: Instructions,
    model: Option<String>,
    model_settings: serde_json::Map<String, Value>,
    tools: ToolBox,
    handoffs: Vec<Handoff>,
    input_guardrails: Vec<InputGuardrail>,
    output_guardrails: Vec<OutputGuardrail>,
    output_schema: Option<Arc<dyn OutputSchema>>,
    hooks: BoxedAgentHooks,
}

impl Agent {
    /// Start building a new agent named `name`.
    ///
    /// # Panics
    /// `AgentBuilder::build` panics are not possible; an empty `name` is
    /// instead rejected with [`AgentError::InvalidConfig`].
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// This agent's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve this turn's instructions string.
    #[must_use]
    pub fn instructions(&self, context: &RunContext) -> String {
        self.instructions.resolve(context)
    }

    /// Model override for this agent, if any.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Free-form model settings merged into every request this agent sends.
    #[must_use]
    pub const fn model_settings(&self) -> &serde_json::Map<String, Value> {
        &self.model_settings
    }

    /// This agent's tool registry.
    #[must_use]
    pub const fn tools(&self) -> &ToolBox {
        &self.tools
    }

    /// This agent's configured handoff targets.
    #[must_use]
    pub fn handoffs(&self) -> &[Handoff] {
        &self.handoffs
    }

    /// This agent's input guardrails, run before every model call.
    #[must_use]
    pub fn input_guardrails(&self) -> &[InputGuardrail] {
        &self.input_guardrails
    }

    /// This agent's output guardrails, run on the final output.
    #[must_use]
    pub fn output_guardrails(&self) -> &[OutputGuardrail] {
        &self.output_guardrails
    }

    /// This agent's requested structured-output schema, if any.
    #[must_use]
    pub fn output_schema(&self) -> Option<&Arc<dyn OutputSchema>> {
        self.output_schema.as_ref()
    }

    /// This agent's lifecycle hooks.
    #[must_use]
    pub fn hooks(&self) -> &BoxedAgentHooks {
        &self.hooks
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools.names())
            .field("handoffs", &self.handoffs.iter().map(Handoff::target).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Agent`], in the teacher's chainable `#[must_use]` idiom.
pub struct AgentBuilder {
    name: String,
    instructions: Instructions,
    model: Option<String>,
    model_settings: serde_json::Map<String, Value>,
    tools: ToolBox,
    handoffs: Vec<Handoff>,
    input_guardrails: Vec<InputGuardrail>,
    output_guardrails: Vec<OutputGuardrail>,
    output_schema: Option<Arc<dyn OutputSchema>>,
    hooks: BoxedAgentHooks,
}

impl AgentBuilder {
    /// Start a new builder for an agent named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Instructions::Static(String::new()),
            model: None,
            model_settings: serde_json::Map::new(),
            tools: ToolBox::new(),
            handoffs: Vec::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            output_schema: None,
            hooks: Arc::new(NoopAgentHooks),
        }
    }

    /// Set fixed instructions text.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set instructions computed from the run context each turn.
    #[must_use]
    pub fn dynamic_instructions(
        mut self,
        func: impl Fn(&RunContext) -> String + Send + Sync + 'static,
    ) -> Self {
        self.instructions = Instructions::Dynamic(Arc::new(func));
        self
    }

    /// Override the model for this agent.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Merge a model setting, e.g. `"max_tokens"`, into every request.
    #[must_use]
    pub fn model_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.model_settings.insert(key.into(), value.into());
        self
    }

    /// Register a tool.
    #[must_use]
    pub fn tool(mut self, tool: impl crate::tool::Tool + 'static) -> Self {
        self.tools.add(tool);
        self
    }

    /// Register a handoff target.
    #[must_use]
    pub fn handoff(mut self, handoff: Handoff) -> Self {
        self.handoffs.push(handoff);
        self
    }

    /// Register an input guardrail.
    #[must_use]
    pub fn input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Register an output guardrail.
    #[must_use]
    pub fn output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Declare a structured-output schema, forwarded verbatim to the model.
    #[must_use]
    pub fn output_schema(mut self, schema: impl OutputSchema + 'static) -> Self {
        self.output_schema = Some(Arc::new(schema));
        self
    }

    /// Attach per-agent lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl AgentHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Finish building.
    ///
    /// # Errors
    /// Returns [`AgentError::InvalidConfig`] if `name` is empty.
    pub fn build(self) -> Result<Agent> {
        if self.name.trim().is_empty() {
            return Err(AgentError::invalid_config("name", "must not be empty"));
        }

        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            model: self.model,
            model_settings: self.model_settings,
            tools: self.tools,
            handoffs: self.handoffs,
            input_guardrails: self.input_guardrails,
            output_guardrails: self.output_guardrails,
            output_schema: self.output_schema,
            hooks: self.hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_empty_name() {
        let err = Agent::builder("   ").build().unwrap_err();
        assert!(matches!(err, AgentError::InvalidConfig { .. }));
    }

    #[test]
    fn build_succeeds_with_defaults() {
        let agent = Agent::builder("triage").instructions("be helpful").build().unwrap();
        assert_eq!(agent.name(), "triage");
        assert!(agent.tools().is_empty());
        assert!(agent.handoffs().is_empty());
    }

    #[test]
    fn dynamic_instructions_see_context() {
        let agent = Agent::builder("triage")
            .dynamic_instructions(|ctx| format!("turn {}", ctx.turn()))
            .build()
            .unwrap();
        let mut ctx = RunContext::new();
        ctx.advance_turn();
        assert_eq!(agent.instructions(&ctx), "turn 1");
    }

    #[test]
    fn model_settings_accumulate() {
        let agent = Agent::builder("triage")
            .model_setting("max_tokens", 500)
            .model_setting("top_k", 3)
            .build()
            .unwrap();
        assert_eq!(agent.model_settings().len(), 2);
    }
}
