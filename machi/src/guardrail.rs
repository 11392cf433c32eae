//! Guardrail pipeline — validators that can abort a run pre- and post-model.
//!
//! - **[`InputGuardrail`]** runs once per turn before the model call. The
//!   first tripped guardrail aborts the run with
//!   [`AgentError::GuardrailTriggered`].
//! - **[`OutputGuardrail`]** runs on the final text output just before
//!   returning, in registration order. A guardrail may return a
//!   *transformed* output via [`GuardrailOutput::pass_with_transform`],
//!   which replaces the value every subsequent guardrail sees — this
//!   ordered pipeline is why output guardrails run sequentially rather
//!   than concurrently, unlike input guardrails' optional parallel mode.
//!
//! A guardrail whose `check` returns `Err` is treated the same as a
//! triggered tripwire by the pipeline driver in `runner`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::Result;
use crate::item::Conversation;

/// The output of a single guardrail check.
#[derive(Debug, Clone)]
pub struct GuardrailOutput {
    /// Whether the tripwire was triggered; `true` aborts the run.
    pub tripwire_triggered: bool,
    /// Structured diagnostic information about the check.
    pub output_info: Value,
    /// For output guardrails: a replacement value for subsequent
    /// guardrails and for the final result. `None` means "unchanged".
    pub transformed: Option<Value>,
}

impl GuardrailOutput {
    /// A passing result with no diagnostic payload.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
            transformed: None,
        }
    }

    /// A passing result carrying diagnostic information.
    #[must_use]
    pub fn pass_with_info(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: info.into(),
            transformed: None,
        }
    }

    /// A passing result that replaces the output for subsequent guardrails.
    #[must_use]
    pub fn pass_with_transform(value: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: false,
            output_info: Value::Null,
            transformed: Some(value.into()),
        }
    }

    /// A failing result; aborts the run with the given diagnostic payload.
    #[must_use]
    pub fn tripwire(info: impl Into<Value>) -> Self {
        Self {
            tripwire_triggered: true,
            output_info: info.into(),
            transformed: None,
        }
    }

    /// `true` if the tripwire was triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.tripwire_triggered
    }
}

/// Validation logic for a turn's input, run before the model is called.
#[async_trait]
pub trait InputGuardrailCheck: Send + Sync {
    /// Validate the conversation about to be sent to the model.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &Conversation,
    ) -> Result<GuardrailOutput>;
}

/// A named, pluggable input guardrail.
#[derive(Clone)]
pub struct InputGuardrail {
    name: String,
    run_in_parallel: bool,
    check: Arc<dyn InputGuardrailCheck>,
}

impl InputGuardrail {
    /// Create a new input guardrail. Sequential by default, since
    /// spec.md's §4.I pipeline is first-failure-wins sequential; opt into
    /// `run_in_parallel(true)` only for guardrails with no ordering
    /// dependency on an earlier guardrail's result.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl InputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            run_in_parallel: false,
            check: Arc::new(check),
        }
    }

    /// Opt this guardrail into running concurrently with others in the
    /// same batch, rather than strictly in registration order.
    #[must_use]
    pub const fn run_in_parallel(mut self, parallel: bool) -> Self {
        self.run_in_parallel = parallel;
        self
    }

    /// This guardrail's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this guardrail is eligible to run concurrently.
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        self.run_in_parallel
    }

    /// Run the check, wrapping its output with this guardrail's name.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        input: &Conversation,
    ) -> Result<InputGuardrailResult> {
        let output = self.check.check(context, agent_name, input).await?;
        Ok(InputGuardrailResult {
            guardrail_name: self.name.clone(),
            output,
        })
    }
}

impl std::fmt::Debug for InputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputGuardrail")
            .field("name", &self.name)
            .field("run_in_parallel", &self.run_in_parallel)
            .finish_non_exhaustive()
    }
}

/// The result of running one [`InputGuardrail`].
#[derive(Debug, Clone)]
pub struct InputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check output.
    pub output: GuardrailOutput,
}

impl InputGuardrailResult {
    /// `true` if this guardrail's tripwire triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}

/// Validation logic for a turn's final output, run just before returning.
#[async_trait]
pub trait OutputGuardrailCheck: Send + Sync {
    /// Validate (and optionally transform) the agent's final output.
    async fn check(
        &self,
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<GuardrailOutput>;
}

/// A named, pluggable output guardrail.
#[derive(Clone)]
pub struct OutputGuardrail {
    name: String,
    check: Arc<dyn OutputGuardrailCheck>,
}

impl OutputGuardrail {
    /// Create a new output guardrail.
    #[must_use]
    pub fn new(name: impl Into<String>, check: impl OutputGuardrailCheck + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// This guardrail's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check, wrapping its output with this guardrail's name.
    pub async fn run(
        &self,
        context: &RunContext,
        agent_name: &str,
        output: &Value,
    ) -> Result<OutputGuardrailResult> {
        let guardrail_output = self.check.check(context, agent_name, output).await?;
        Ok(OutputGuardrailResult {
            guardrail_name: self.name.clone(),
            output: guardrail_output,
        })
    }
}

impl std::fmt::Debug for OutputGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The result of running one [`OutputGuardrail`].
#[derive(Debug, Clone)]
pub struct OutputGuardrailResult {
    /// Name of the guardrail that produced this result.
    pub guardrail_name: String,
    /// The check output.
    pub output: GuardrailOutput,
}

impl OutputGuardrailResult {
    /// `true` if this guardrail's tripwire triggered.
    #[must_use]
    pub const fn is_triggered(&self) -> bool {
        self.output.tripwire_triggered
    }
}

/// Run input guardrails sequentially, short-circuiting on the first
/// triggered tripwire or propagated error. Returns `Ok(())` if every
/// guardrail passed.
///
/// # Errors
/// Returns [`crate::error::AgentError::GuardrailTriggered`] for the first
/// guardrail whose tripwire is triggered, or any error a guardrail's own
/// check propagates.
pub async fn run_input_guardrails(
    guardrails: &[InputGuardrail],
    context: &RunContext,
    agent_name: &str,
    input: &Conversation,
) -> Result<()> {
    for guardrail in guardrails {
        let result = guardrail.run(context, agent_name, input).await?;
        if result.is_triggered() {
            return Err(crate::error::AgentError::guardrail_triggered(
                result.guardrail_name,
                describe(&result.output.output_info),
                result.output.output_info,
            ));
        }
    }
    Ok(())
}

/// Run output guardrails sequentially as an ordered transform pipeline:
/// each guardrail sees the previous guardrail's (possibly transformed)
/// output. Returns the final, possibly-transformed output on success.
///
/// # Errors
/// Returns [`crate::error::AgentError::OutputGuardrailTriggered`] for the
/// first guardrail whose tripwire is triggered, carrying the would-be
/// output at the point of failure.
pub async fn run_output_guardrails(
    guardrails: &[OutputGuardrail],
    context: &RunContext,
    agent_name: &str,
    initial_output: Value,
) -> Result<Value> {
    let mut current = initial_output;
    for guardrail in guardrails {
        let result = guardrail.run(context, agent_name, &current).await?;
        if result.is_triggered() {
            return Err(crate::error::AgentError::output_guardrail_triggered(
                result.guardrail_name,
                describe(&result.output.output_info),
                result.output.output_info,
                current,
            ));
        }
        if let Some(transformed) = result.output.transformed {
            current = transformed;
        }
    }
    Ok(current)
}

fn describe(info: &Value) -> String {
    match info {
        Value::String(s) => s.clone(),
        Value::Null => "guardrail triggered".to_owned(),
        other => other.to_string(),
    }
}
