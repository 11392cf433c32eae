//! Context holder — carries run-scoped state through the turn loop.
//!
//! [`RunContext`] tracks the bookkeeping the engine itself needs (cumulative
//! usage, the current turn number, free-form metadata); [`Context`] wraps it
//! together with an opaque, user-supplied value that the engine never reads
//! or mutates, only passes through to tools, guardrails, and hooks.

use std::collections::HashMap;

use serde_json::Value;

use crate::usage::Usage;

/// Engine-owned state threaded through every callback during one run.
///
/// All mutations are serialised: the Runner is the only writer, and it
/// never holds the context across an await point while mutating it, so
/// there is no concurrent-access hazard despite the absence of interior
/// mutability.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    usage: Usage,
    turn: usize,
    metadata: HashMap<String, Value>,
}

impl RunContext {
    /// Create a new, empty run context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cumulative usage for the run.
    #[must_use]
    pub const fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Current turn number (0-indexed, before the first model call).
    #[must_use]
    pub const fn turn(&self) -> usize {
        self.turn
    }

    /// Add usage from a completed model call to the running total.
    pub fn update_usage(&mut self, incoming: Usage) {
        self.usage += incoming;
    }

    /// Set a metadata value. Overwrites any existing value for the key.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Read a metadata value, if present.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Advance the turn counter. Called by the Runner once per tool-result
    /// continuation; a handoff resets the counter instead of advancing it.
    pub const fn advance_turn(&mut self) {
        self.turn += 1;
    }

    /// Reset the turn counter to zero, preserving usage and metadata.
    ///
    /// Invoked by the Runner when a handoff re-targets the loop to a new
    /// agent: usage and trace identity survive the handoff, but the new
    /// agent starts at turn zero.
    pub const fn reset_turn(&mut self) {
        self.turn = 0;
    }
}

/// A [`RunContext`] paired with an opaque, user-supplied value.
///
/// The engine treats `user` as read-only data: tools and guardrails may
/// read it, but only the engine's own `run`/`metadata` fields inside
/// [`RunContext`] are ever written by the core.
#[derive(Debug, Clone)]
pub struct Context<T> {
    /// Engine-owned run bookkeeping.
    pub run: RunContext,
    user: T,
}

impl<T> Context<T> {
    /// Wrap a user-supplied value in a fresh run context.
    #[must_use]
    pub fn wrap(user_value: T) -> Self {
        Self {
            run: RunContext::new(),
            user: user_value,
        }
    }

    /// Borrow the opaque user value.
    #[must_use]
    pub const fn user(&self) -> &T {
        &self.user
    }
}

impl Context<()> {
    /// Create a context with no user payload.
    #[must_use]
    pub fn new() -> Self {
        Self::wrap(())
    }
}

impl Default for Context<()> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod run_context {
        use super::*;

        #[test]
        fn new_is_empty() {
            let ctx = RunContext::new();
            assert_eq!(ctx.turn(), 0);
            assert!(ctx.usage().is_empty());
        }

        #[test]
        fn update_usage_accumulates() {
            let mut ctx = RunContext::new();
            ctx.update_usage(Usage::new(10, 5));
            ctx.update_usage(Usage::new(20, 10));
            assert_eq!(ctx.usage().input_tokens, 30);
            assert_eq!(ctx.usage().output_tokens, 15);
        }

        #[test]
        fn metadata_roundtrip() {
            let mut ctx = RunContext::new();
            ctx.set_metadata("key", serde_json::json!("value"));
            assert_eq!(ctx.get_metadata("key"), Some(&serde_json::json!("value")));
            assert!(ctx.get_metadata("missing").is_none());
        }

        #[test]
        fn advance_and_reset_turn() {
            let mut ctx = RunContext::new();
            ctx.advance_turn();
            ctx.advance_turn();
            assert_eq!(ctx.turn(), 2);
            ctx.reset_turn();
            assert_eq!(ctx.turn(), 0);
        }

        #[test]
        fn reset_turn_preserves_usage_and_metadata() {
            let mut ctx = RunContext::new();
            ctx.update_usage(Usage::new(10, 5));
            ctx.set_metadata("k", serde_json::json!(1));
            ctx.advance_turn();
            ctx.reset_turn();
            assert_eq!(ctx.turn(), 0);
            assert_eq!(ctx.usage().input_tokens, 10);
            assert_eq!(ctx.get_metadata("k"), Some(&serde_json::json!(1)));
        }
    }

    mod context {
        use super::*;

        #[test]
        fn wrap_exposes_user_value() {
            let ctx = Context::wrap(42_i32);
            assert_eq!(*ctx.user(), 42);
            assert_eq!(ctx.run.turn(), 0);
        }

        #[test]
        fn new_has_unit_user() {
            let ctx = Context::<()>::new();
            assert_eq!(*ctx.user(), ());
        }
    }
}
