//! System prompt composition for the active step.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};
use tracing::debug;

use crate::core::types::{Script, Step};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Renders the system turn for a step of a script.
///
/// Scripts may replace the built-in template with their own `system_prompt`.
/// Templates see `persona`, `intro`, `task` and `condition`; any other
/// variable is an error.
pub struct PromptComposer {
    env: Environment<'static>,
    template: String,
    persona: String,
}

impl PromptComposer {
    pub fn new(script: &Script) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        let template = script
            .system_prompt
            .clone()
            .unwrap_or_else(|| SYSTEM_TEMPLATE.to_string());
        Self {
            env,
            template,
            persona: script.persona.clone(),
        }
    }

    /// Compose the system instruction for `step`. Deterministic for a given step.
    pub fn compose(&self, step: &Step) -> Result<String> {
        let rendered = self
            .env
            .render_str(
                &self.template,
                context! {
                    persona => self.persona.trim(),
                    intro => step.intro.trim(),
                    task => step.task.trim(),
                    condition => step.condition.as_deref().map(str::trim).filter(|s| !s.is_empty()),
                },
            )
            .context("render system prompt")?;
        debug!(bytes = rendered.len(), "composed system prompt");
        Ok(rendered)
    }

    /// Render the template once per step and collect failures.
    pub fn check(&self, steps: &[Step]) -> Vec<String> {
        steps
            .iter()
            .enumerate()
            .filter_map(|(idx, step)| {
                self.compose(step)
                    .err()
                    .map(|err| format!("steps[{idx}]: {err:#}"))
            })
            .collect()
    }
}
