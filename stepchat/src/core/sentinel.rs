//! Classification of model replies into step signals.
//!
//! Replies are free text, conventionally prefixed with a bracketed status
//! token such as `(IN PROGRESS)` or `(DONE)`. Only the literal markers below
//! drive the walker; anything else counts as in progress.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::StepSignal;

/// Marker signalling the active step is satisfied.
pub const DONE_MARKER: &str = "(DONE)";
/// Marker signalling the run should abort.
pub const FAIL_MARKER: &str = "FAIL";

static STATUS_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(([^()]+)\)").expect("status token regex"));

/// Classify a reply. `(DONE)` takes precedence over `FAIL`.
pub fn classify_reply(reply: &str) -> StepSignal {
    if reply.contains(DONE_MARKER) {
        return StepSignal::Complete;
    }
    if let Some(idx) = reply.find(FAIL_MARKER) {
        let rest = &reply[idx + FAIL_MARKER.len()..];
        let reason = rest
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
            .trim_end()
            .to_string();
        return StepSignal::Failed { reason };
    }
    StepSignal::InProgress
}

/// Leading bracketed status label, if any (e.g. `IN PROGRESS`).
pub fn status_token(reply: &str) -> Option<&str> {
    STATUS_TOKEN_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
