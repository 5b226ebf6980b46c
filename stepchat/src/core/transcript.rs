//! Ordered turn history exchanged with the completion provider.

use serde::Serialize;

use crate::core::types::{Role, Turn};

/// Append-only transcript whose first turn is always the system turn.
///
/// The system turn is the only entry that is ever rewritten; everything
/// after it is appended in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with the given system instruction.
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system)],
        }
    }

    /// Overwrite the system turn at position 0.
    pub fn set_system(&mut self, content: impl Into<String>) {
        self.turns[0].content = content.into();
    }

    pub fn system(&self) -> &str {
        &self.turns[0].content
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> &Turn {
        // Never empty: the system turn is created in `new`.
        &self.turns[self.turns.len() - 1]
    }

    /// Number of turns written by the given role.
    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|turn| turn.role == role).count()
    }
}
