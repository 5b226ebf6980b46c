//! Script loading: the built-in step table and TOML script files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_script_invariants;
use crate::core::types::{Script, Step};
use crate::io::prompt::PromptComposer;

pub const SCRIPT_SCHEMA: &str = include_str!("../../schemas/script.v1.schema.json");

/// Home-services intake script compiled into the binary.
pub fn builtin_script() -> Script {
    Script {
        name: "service-intake".to_string(),
        persona: "a friendly receptionist for a home services company".to_string(),
        system_prompt: None,
        steps: vec![
            Step {
                intro: "Hello, how can I help you today?".to_string(),
                task: "Ask one question to understand what work they want done. Ask a follow up \
                       question to understand their issue. Only ask one question at a time. Do \
                       not ask about schedule. Do not ask for contact information."
                    .to_string(),
                condition: None,
            },
            Step {
                intro: "Okay thank you for the info. Could I get your name and phone number?"
                    .to_string(),
                task: "Get the user's name and phone number. Repeat back the information to the \
                       user to confirm."
                    .to_string(),
                condition: Some("The user has confirmed both their name and number.".to_string()),
            },
            Step {
                intro: "And what would be the best day and time for someone to come by?"
                    .to_string(),
                task: "Get the user's preferred day and time for service. Repeat back the \
                       information to the user to confirm."
                    .to_string(),
                condition: Some("The user has confirmed a day and a time.".to_string()),
            },
            Step {
                intro: "Okay great! We will have someone come by. Is there anything else I can \
                        help you with?"
                    .to_string(),
                task: "Close out the conversation.".to_string(),
                condition: None,
            },
        ],
    }
}

/// Load the script at `path`, or the built-in script when `path` is `None`.
pub fn resolve_script(path: Option<&Path>) -> Result<Script> {
    match path {
        Some(path) => load_script(path),
        None => Ok(builtin_script()),
    }
}

/// Read, schema-check and validate a TOML script file.
pub fn load_script(path: &Path) -> Result<Script> {
    debug!(path = %path.display(), "loading script");
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("load script {}", path.display()))
}

/// Parse a TOML script: schema conformance, then semantic invariants, then
/// a trial render of the system prompt for every step.
pub fn parse_script(contents: &str) -> Result<Script> {
    let instance: Value = toml::from_str(contents).context("parse script toml")?;
    let schema: Value = serde_json::from_str(SCRIPT_SCHEMA).context("parse script schema")?;
    validate_schema(&instance, &schema)?;

    let script: Script = serde_json::from_value(instance).context("parse script as v1 struct")?;
    let errors = check_script(&script);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    debug!(name = %script.name, steps = script.steps.len(), "script loaded");
    Ok(script)
}

/// Invariant and template errors for an already-parsed script.
pub fn check_script(script: &Script) -> Vec<String> {
    let mut errors = validate_script_invariants(script);
    errors.extend(PromptComposer::new(script).check(&script.steps));
    errors
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
