//! Sources of user turns.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// Supplies the next user reply to the walker.
pub trait TurnSource {
    /// Next user turn, or `None` once input is exhausted.
    fn next_turn(&mut self) -> Result<Option<String>>;
}

/// Console turn source: prints a `User: ` prompt and reads one line.
pub struct ConsoleTurns<R, W> {
    input: R,
    prompt: W,
}

impl<R: BufRead, W: Write> ConsoleTurns<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }
}

impl<R: BufRead, W: Write> TurnSource for ConsoleTurns<R, W> {
    fn next_turn(&mut self) -> Result<Option<String>> {
        write!(self.prompt, "User: ").context("write user prompt")?;
        self.prompt.flush().context("flush user prompt")?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read user turn")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
