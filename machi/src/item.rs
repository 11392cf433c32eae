//! Conversation items and the ordered conversation they form.
//!
//! A [`Conversation`] is the append-only history the Runner sends to the
//! model adapter on every turn. Items are never mutated once appended;
//! [`Item::FunctionCallOutput`] items must always reference an earlier
//! [`Item::FunctionCall`] with the same `call_id` (enforced by
//! [`Conversation::push`] in debug builds via [`Conversation::validate`]).

use serde::{Deserialize, Serialize};

/// The role attached to a `message` conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A message authored by the end user.
    User,
    /// A message authored by the assistant (rarely fed back verbatim; text
    /// output items are normally represented as [`Item::Text`] instead).
    Assistant,
    /// A system-level message, distinct from agent `instructions`.
    System,
}

/// A single tagged element of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Item {
    /// User or assistant text input.
    Message {
        /// Who authored this message.
        role: Role,
        /// The message text.
        content: String,
    },

    /// Normalised assistant text output.
    Text {
        /// The output text.
        text: String,
    },

    /// A function call requested by the model.
    FunctionCall {
        /// Id correlating this call to its eventual output.
        call_id: String,
        /// Name of the function being called.
        name: String,
        /// Arguments, as a JSON-encoded string (per the wire format).
        arguments: String,
    },

    /// The local result of executing a [`Item::FunctionCall`].
    FunctionCallOutput {
        /// Id of the `function_call` this output answers.
        call_id: String,
        /// Output, as a JSON-encoded string.
        output: String,
    },

    /// A structured handoff item (rare; handoffs usually arrive as a
    /// `function_call` named `handoff_to_<target>` instead, see
    /// [`crate::handoff`]).
    Handoff {
        /// Name of the target agent.
        target: String,
    },
}

impl Item {
    /// Construct a user message item from plain text.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::Message {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Returns the `call_id` this item carries, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::FunctionCall { call_id, .. } | Self::FunctionCallOutput { call_id, .. } => {
                Some(call_id)
            }
            _ => None,
        }
    }

    /// Returns `true` if this is a function call whose name is a handoff
    /// shim (`handoff_to_<target>`), per [`crate::handoff`].
    #[must_use]
    pub fn is_handoff_call(&self) -> bool {
        matches!(self, Self::FunctionCall { name, .. } if name.starts_with(crate::handoff::HANDOFF_PREFIX))
    }
}

/// An ordered, append-only sequence of conversation items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation(Vec<Item>);

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Wrap a plain string as the initial user input.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(vec![Item::user(text)])
    }

    /// Use an explicit item sequence as the initial conversation, verbatim.
    #[must_use]
    pub fn from_items(items: Vec<Item>) -> Self {
        Self(items)
    }

    /// Append an item to the end of the conversation.
    ///
    /// # Panics
    /// In debug builds, panics if appending `item` would break the
    /// `function_call_output` → `function_call` pairing invariant checked
    /// by [`Self::validate`].
    pub fn push(&mut self, item: Item) {
        self.0.push(item);
        debug_assert!(self.validate(), "function_call_output must follow a matching function_call");
    }

    /// Append every item from an iterator, preserving order.
    ///
    /// # Panics
    /// In debug builds, panics under the same condition as [`Self::push`].
    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) {
        self.0.extend(items);
        debug_assert!(self.validate(), "function_call_output must follow a matching function_call");
    }

    /// Borrow the items in order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.0
    }

    /// Number of items in the conversation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the conversation has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Verify that every `function_call_output` is preceded by exactly one
    /// `function_call` with a matching `call_id`.
    ///
    /// This is the invariant spec.md §8 requires the engine to uphold; it
    /// is exercised directly by tests and may be called defensively before
    /// building a request.
    #[must_use]
    pub fn validate(&self) -> bool {
        let mut seen_calls = std::collections::HashSet::new();
        for item in &self.0 {
            match item {
                Item::FunctionCall { call_id, .. } => {
                    seen_calls.insert(call_id.clone());
                }
                Item::FunctionCallOutput { call_id, .. } => {
                    if !seen_calls.remove(call_id) {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }
}

impl IntoIterator for Conversation {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
