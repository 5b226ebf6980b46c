//! Transcript logs written after `stepchat run` and read back by
//! `stepchat compare`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::Turn;
use crate::walker::WalkStop;

/// Final state of one conversation, as written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptRecord<'a> {
    pub script: &'a str,
    pub model: &'a str,
    pub cursor: usize,
    pub stop: &'a WalkStop,
    pub turns: &'a [Turn],
}

/// The part of a transcript log that `compare` replays.
#[derive(Debug, Deserialize)]
struct StoredTranscript {
    turns: Vec<Turn>,
}

/// Atomically write a transcript record as pretty JSON (temp file + rename).
pub fn write_transcript(path: &Path, record: &TranscriptRecord<'_>) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(record).context("serialize transcript")?;
    buf.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp transcript {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace transcript {}", path.display()))?;
    Ok(())
}

/// Read the turns of a transcript log.
pub fn load_transcript_turns(path: &Path) -> Result<Vec<Turn>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let stored: StoredTranscript = serde_json::from_str(&contents)
        .with_context(|| format!("parse transcript {}", path.display()))?;
    Ok(stored.turns)
}
