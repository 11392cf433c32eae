//! Handoff resolver — re-targets the Runner's loop to a different agent.
//!
//! A [`Handoff`] is exposed to the model as a synthetic function tool named
//! `handoff_to_<target>`, reusing the teacher's "represent an inter-agent
//! transfer as a normal function call" trick from its managed-agent
//! dispatch. Unlike the teacher, which runs the target as a nested,
//! recursive sub-run and folds its final output back into the parent's
//! transcript, a resolved handoff here performs a genuine re-target: the
//! Runner swaps its active agent and continues the *same* turn loop against
//! the (optionally filtered) conversation so far.

use std::sync::Arc;

use serde_json::Value;

use crate::agent::Agent;
use crate::item::Conversation;

/// Prefix reserved for synthetic handoff function-call names. A regular
/// tool's name must never begin with this, see [`crate::tool::Tool::name`].
pub const HANDOFF_PREFIX: &str = "handoff_to_";

/// A filter applied to the conversation carried across a handoff.
///
/// Implementations may redact, truncate, or otherwise transform history
/// before the target agent sees it. The default (no filter) carries the
/// conversation across unchanged.
pub trait InputFilter: Send + Sync {
    /// Transform the conversation handed off to the target agent.
    fn filter(&self, conversation: Conversation) -> Conversation;
}

/// An [`InputFilter`] that passes the conversation through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl InputFilter for PassThrough {
    fn filter(&self, conversation: Conversation) -> Conversation {
        conversation
    }
}

/// A configured transfer target exposed to the model as a function tool.
///
/// Carries the actual target [`Agent`] (not just its name) so a resolved
/// handoff can hand the Runner a concrete agent to re-target to.
#[derive(Clone)]
pub struct Handoff {
    target_agent: Arc<Agent>,
    description: String,
    parameters: Value,
    input_filter: Arc<dyn InputFilter>,
}

impl Handoff {
    /// Create a handoff to `target_agent`, using the default
    /// `{input: string}` parameter schema and no input filter.
    #[must_use]
    pub fn new(target_agent: Agent) -> Self {
        let description = format!("Transfer the conversation to the \"{}\" agent.", target_agent.name());
        Self {
            target_agent: Arc::new(target_agent),
            description,
            parameters: default_parameters(),
            input_filter: Arc::new(PassThrough),
        }
    }

    /// Override the description shown to the model for this transfer.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the JSON-Schema parameters for this handoff's function
    /// tool. Defaults to `{"type": "object", "properties": {"input": {"type": "string"}}}`.
    #[must_use]
    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach an [`InputFilter`] applied to the conversation carried to
    /// the target agent.
    #[must_use]
    pub fn input_filter(mut self, filter: impl InputFilter + 'static) -> Self {
        self.input_filter = std::sync::Arc::new(filter);
        self
    }

    /// Name of the target agent.
    #[must_use]
    pub fn target(&self) -> &str {
        self.target_agent.name()
    }

    /// The target agent itself, handed to the Runner on a resolved handoff.
    #[must_use]
    pub fn agent(&self) -> &Arc<Agent> {
        &self.target_agent
    }

    /// The synthetic function-tool name the model sees for this handoff,
    /// e.g. `handoff_to_spanish_agent`.
    #[must_use]
    pub fn tool_name(&self) -> String {
        format!("{HANDOFF_PREFIX}{}", self.target())
    }

    /// Build this handoff's [`crate::tool::ToolDefinition`] for the
    /// request's `tools` array.
    #[must_use]
    pub fn definition(&self) -> crate::tool::ToolDefinition {
        crate::tool::ToolDefinition::new(self.tool_name(), self.description.clone(), self.parameters.clone())
    }

    /// Apply this handoff's input filter to the conversation so far.
    #[must_use]
    pub fn apply_filter(&self, conversation: Conversation) -> Conversation {
        self.input_filter.filter(conversation)
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("target", &self.target())
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

fn default_parameters() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "input": {"type": "string"}
        },
        "required": ["input"]
    })
}

/// Outcome of scanning a turn's tool calls for a handoff request.
pub struct Resolved<'a> {
    /// The handoff that matched, taken from the agent's configured list.
    pub handoff: &'a Handoff,
    /// Arguments the model supplied to the synthetic function call.
    pub arguments: Value,
}

/// Scan `call_names` (function-call names from the current turn, in
/// order) for the first one that matches a configured handoff's tool
/// name. Only the first match is honoured; any further handoff calls in
/// the same turn are discarded, per the engine's at-most-one-handoff-per-turn
/// rule.
#[must_use]
pub fn resolve<'a>(
    handoffs: &'a [Handoff],
    calls: &[(String, Value)],
) -> Option<Resolved<'a>> {
    for (name, arguments) in calls {
        if let Some(handoff) = handoffs.iter().find(|h| &h.tool_name() == name) {
            return Some(Resolved {
                handoff,
                arguments: arguments.clone(),
            });
        }
    }
    None
}
