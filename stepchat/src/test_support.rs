//! Test-only helpers: deterministic scripts, scripted collaborators and a
//! mock OpenAI-compatible server for provider tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use anyhow::{Result, anyhow};
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer, Request};

use crate::core::types::{Script, Step, Turn};
use crate::io::provider::{ChatProvider, Embedder};
use crate::io::turns::TurnSource;

/// Create a deterministic step with no condition.
pub fn step(id: &str) -> Step {
    Step {
        intro: format!("{id} intro"),
        task: format!("{id} task"),
        condition: None,
    }
}

/// Create a script around `steps` using the built-in system prompt.
pub fn script_with_steps(steps: Vec<Step>) -> Script {
    Script {
        name: "test".to_string(),
        persona: "a test persona".to_string(),
        system_prompt: None,
        steps,
    }
}

/// Provider that returns predetermined replies and records every transcript.
pub struct ScriptedProvider {
    replies: RefCell<VecDeque<String>>,
    calls: RefCell<Vec<Vec<Turn>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Transcripts passed to `complete`, in call order.
    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.borrow().clone()
    }
}

impl ChatProvider for ScriptedProvider {
    fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.calls.borrow_mut().push(turns.to_vec());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted provider has no reply left"))
    }
}

/// Turn source that yields predetermined user lines, then `None`.
pub struct ScriptedTurns {
    lines: VecDeque<String>,
}

impl ScriptedTurns {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Lines not yet handed out.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl TurnSource for ScriptedTurns {
    fn next_turn(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Embedder that maps known texts to fixed vectors and records each call.
pub struct ScriptedEmbedder {
    vectors: BTreeMap<String, Vec<f64>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedEmbedder {
    pub fn new<I, S>(vectors: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        Self {
            vectors: vectors
                .into_iter()
                .map(|(text, vector)| (text.into(), vector))
                .collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Inputs passed to `embed`, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl Embedder for ScriptedEmbedder {
    fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>> {
        self.calls.borrow_mut().push(inputs.to_vec());
        inputs
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .ok_or_else(|| anyhow!("scripted embedder has no vector for {text:?}"))
            })
            .collect()
    }
}

/// Blocking handle on a `wiremock` server for provider tests.
///
/// The mock server runs on its own thread, so blocking HTTP clients can call
/// it from the test thread; the runtime only drives setup and inspection.
pub struct MockApi {
    server: MockServer,
    runtime: Runtime,
}

impl MockApi {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    /// Base URL in the shape of an OpenAI-compatible endpoint.
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.server.uri())
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// Requests received so far, in arrival order.
    pub fn received_requests(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .expect("request recording enabled")
    }
}
