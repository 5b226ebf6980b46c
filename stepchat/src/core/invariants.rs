//! Semantic invariants not expressible via JSON Schema.

use crate::core::types::Script;

/// Check script invariants the schema cannot express:
/// - At least one step
/// - Non-blank `name` and `persona`
/// - Non-blank `intro` and `task` for every step
/// - `condition`, when present, is non-blank
pub fn validate_script_invariants(script: &Script) -> Vec<String> {
    let mut errors = Vec::new();

    if script.name.trim().is_empty() {
        errors.push("name must not be blank".to_string());
    }
    if script.persona.trim().is_empty() {
        errors.push("persona must not be blank".to_string());
    }
    if script.steps.is_empty() {
        errors.push("steps must contain at least one step".to_string());
    }

    for (idx, step) in script.steps.iter().enumerate() {
        if step.intro.trim().is_empty() {
            errors.push(format!("steps[{idx}]: intro must not be blank"));
        }
        if step.task.trim().is_empty() {
            errors.push(format!("steps[{idx}]: task must not be blank"));
        }
        if step
            .condition
            .as_deref()
            .is_some_and(|condition| condition.trim().is_empty())
        {
            errors.push(format!(
                "steps[{idx}]: condition must not be blank when present"
            ));
        }
    }

    errors
}
