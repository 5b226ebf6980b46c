//! Shared deterministic types for the step walker.
//!
//! These types define stable contracts between the walker, the prompt
//! composer and the provider adapters. They carry no I/O.

use serde::{Deserialize, Serialize};

/// Author of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single scripted task. Its index in [`Script::steps`] is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Line the assistant says when the step becomes active.
    pub intro: String,
    /// Instruction given to the model while the step is active.
    pub task: String,
    /// Optional completion condition appended to the instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Immutable conversation script handed to a walker at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    /// Fixed persona string rendered into every system turn.
    pub persona: String,
    /// Optional minijinja template replacing the built-in system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub steps: Vec<Step>,
}

/// Outcome parsed from a single model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSignal {
    /// The active step needs more user input.
    InProgress,
    /// The active step is satisfied.
    Complete,
    /// The model gave up on the script.
    Failed { reason: String },
}

/// Walker state after a reply has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WalkState {
    AwaitingUser,
    AllComplete,
    Failed { reason: String },
}

impl WalkState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WalkState::AwaitingUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let turn = Turn::assistant("hi");
        let json = serde_json::to_string(&turn).expect("serialize");
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn step_condition_is_optional_in_toml() {
        let step: Step = toml::from_str("intro = \"Hi\"\ntask = \"Greet\"\n").expect("parse");
        assert_eq!(step.condition, None);
    }

    #[test]
    fn only_awaiting_user_is_non_terminal() {
        assert!(!WalkState::AwaitingUser.is_terminal());
        assert!(WalkState::AllComplete.is_terminal());
        assert!(
            WalkState::Failed {
                reason: String::new()
            }
            .is_terminal()
        );
    }
}
