//! Conversation step walker.
//!
//! A [`Walker`] owns one conversation: the immutable script, a cursor into its
//! steps and the transcript. Each [`Walker::advance`] rewrites the system turn
//! for the active step, asks the provider for a reply and applies the parsed
//! [`StepSignal`]. [`run_walk`] drives a walker with user turns until the
//! script completes, the model fails the run, or input runs out.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::sentinel::{classify_reply, status_token};
use crate::core::transcript::Transcript;
use crate::core::types::{Role, Script, Step, StepSignal, WalkState};
use crate::io::prompt::PromptComposer;
use crate::io::provider::ChatProvider;
use crate::io::turns::TurnSource;

/// Result of applying one model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// Assistant message appended to the transcript and shown to the user.
    pub message: String,
    /// Signal parsed from the raw reply.
    pub signal: StepSignal,
    /// Walker state after the reply.
    pub state: WalkState,
}

pub struct Walker {
    script: Script,
    composer: PromptComposer,
    cursor: usize,
    transcript: Transcript,
    state: WalkState,
}

impl Walker {
    /// Start a conversation at step 0: `[system(step 0), assistant(step 0 intro)]`.
    pub fn new(script: Script) -> Result<Self> {
        let composer = PromptComposer::new(&script);
        let first = script
            .steps
            .first()
            .ok_or_else(|| anyhow!("script {} has no steps", script.name))?;
        let mut transcript = Transcript::new(composer.compose(first)?);
        transcript.push_assistant(first.intro.clone());
        debug!(script = %script.name, steps = script.steps.len(), "walker created");
        Ok(Self {
            script,
            composer,
            cursor: 0,
            transcript,
            state: WalkState::AwaitingUser,
        })
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Index of the active step; equals the step count once all steps are done.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> &WalkState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Active step, or `None` after the last step completed.
    pub fn current_step(&self) -> Option<&Step> {
        self.script.steps.get(self.cursor)
    }

    /// Composed system instruction for the active step.
    pub fn compose_current(&self) -> Result<String> {
        let step = self
            .current_step()
            .ok_or_else(|| anyhow!("no active step (cursor {})", self.cursor))?;
        self.composer.compose(step)
    }

    /// Append a user turn.
    pub fn push_user(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        self.transcript.push_user(text);
        Ok(())
    }

    /// Rewrite the system turn, request a reply and apply it.
    ///
    /// The last transcript turn must be a user turn.
    #[instrument(skip_all, fields(cursor = self.cursor))]
    pub fn advance<P: ChatProvider + ?Sized>(&mut self, provider: &P) -> Result<Advance> {
        self.ensure_active()?;
        if self.transcript.last().role != Role::User {
            bail!("the last turn must be from the user before requesting a reply");
        }
        self.sync_system()?;
        let reply = provider
            .complete(self.transcript.turns())
            .context("request completion")?;
        self.apply_reply(reply)
    }

    /// Apply a model reply to the cursor and transcript.
    pub fn apply_reply(&mut self, reply: String) -> Result<Advance> {
        self.ensure_active()?;
        let signal = classify_reply(&reply);
        debug!(
            cursor = self.cursor,
            status = status_token(&reply).unwrap_or("-"),
            ?signal,
            "classified reply"
        );

        let (message, state) = match &signal {
            StepSignal::InProgress => (reply, WalkState::AwaitingUser),
            StepSignal::Failed { reason } => {
                warn!(cursor = self.cursor, %reason, "model failed the run");
                (
                    reply,
                    WalkState::Failed {
                        reason: reason.clone(),
                    },
                )
            }
            StepSignal::Complete => {
                let completed = self.cursor;
                self.cursor += 1;
                match self.script.steps.get(self.cursor) {
                    Some(next) => {
                        info!(completed, next = self.cursor, "step complete");
                        (format!("{reply}\n{}", next.intro), WalkState::AwaitingUser)
                    }
                    None => {
                        info!(completed, "all steps complete");
                        (reply, WalkState::AllComplete)
                    }
                }
            }
        };

        self.transcript.push_assistant(message.clone());
        self.state = state.clone();
        if !state.is_terminal() {
            self.sync_system()?;
        }
        Ok(Advance {
            message,
            signal,
            state,
        })
    }

    fn sync_system(&mut self) -> Result<()> {
        let content = self.compose_current()?;
        self.transcript.set_system(content);
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_terminal() {
            bail!("conversation already finished ({:?})", self.state);
        }
        Ok(())
    }
}

/// Reason why `run_walk` stopped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalkStop {
    /// Every step was completed.
    AllComplete,
    /// The model replied with the failure marker.
    Failed { reason: String },
    /// The turn source ran out before the script finished.
    InputClosed,
}

/// Summary of a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOutcome {
    pub script: String,
    pub cursor: usize,
    pub model_calls: u32,
    pub stop: WalkStop,
}

/// Drive `walker` with turns from `turns` until it finishes or input closes.
///
/// `on_message` sees every assistant message, starting with the pending
/// opening line. Provider and input errors abort the walk.
pub fn run_walk<P, T, F>(
    walker: &mut Walker,
    provider: &P,
    turns: &mut T,
    mut on_message: F,
) -> Result<WalkOutcome>
where
    P: ChatProvider + ?Sized,
    T: TurnSource + ?Sized,
    F: FnMut(&str),
{
    if walker.transcript().last().role == Role::Assistant {
        on_message(&walker.transcript().last().content);
    }

    let mut model_calls = 0u32;
    let stop = loop {
        let Some(text) = turns.next_turn().context("read user turn")? else {
            info!(cursor = walker.cursor(), "input closed");
            break WalkStop::InputClosed;
        };
        walker.push_user(text)?;

        let step = walker.advance(provider)?;
        model_calls += 1;
        on_message(&step.message);

        match step.state {
            WalkState::AwaitingUser => {}
            WalkState::AllComplete => break WalkStop::AllComplete,
            WalkState::Failed { reason } => break WalkStop::Failed { reason },
        }
    };

    Ok(WalkOutcome {
        script: walker.script().name.clone(),
        cursor: walker.cursor(),
        model_calls,
        stop,
    })
}
