//! Reference-transcript comparison.
//!
//! Replays a recorded conversation against one or more chat models: for every
//! user turn that the reference answered, each model is asked for its own reply
//! to the same prefix of the conversation. Replies are scored against the
//! recorded assistant reply by embedding cosine similarity.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::similarity::cosine_similarity;
use crate::core::types::{Role, Turn};
use crate::io::provider::{ChatProvider, Embedder};

/// A chat model under comparison.
pub struct Candidate<'a> {
    pub model: &'a str,
    pub provider: &'a dyn ChatProvider,
}

/// One model reply and its similarity to the recorded reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReply {
    pub model: String,
    pub reply: String,
    pub similarity: f64,
}

/// All replies generated for one user turn of the reference transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnComparison {
    /// Index of the user turn in the reference transcript.
    pub message_index: usize,
    pub user: String,
    pub expected: String,
    pub replies: Vec<ModelReply>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub turns: Vec<TurnComparison>,
}

impl ComparisonReport {
    /// Mean similarity per model, in the order models first appear.
    pub fn model_means(&self) -> Vec<(String, f64)> {
        let mut totals: Vec<(String, f64, u32)> = Vec::new();
        for reply in self.turns.iter().flat_map(|turn| &turn.replies) {
            match totals.iter_mut().find(|(model, _, _)| *model == reply.model) {
                Some((_, sum, count)) => {
                    *sum += reply.similarity;
                    *count += 1;
                }
                None => totals.push((reply.model.clone(), reply.similarity, 1)),
            }
        }
        totals
            .into_iter()
            .map(|(model, sum, count)| (model, sum / f64::from(count)))
            .collect()
    }

    /// Number of replies scoring strictly below `threshold`.
    pub fn below(&self, threshold: f64) -> usize {
        self.turns
            .iter()
            .flat_map(|turn| &turn.replies)
            .filter(|reply| reply.similarity < threshold)
            .count()
    }
}

/// Ask every candidate `repeats` times per answered user turn and score the
/// replies against the reference.
///
/// A model sees the reference transcript up to and including the user turn,
/// never its own earlier replies. Any provider or embedding error aborts the
/// comparison.
#[instrument(
    skip_all,
    fields(turns = turns.len(), models = candidates.len(), repeats = repeats)
)]
pub fn compare_transcript(
    turns: &[Turn],
    candidates: &[Candidate<'_>],
    repeats: u32,
    embedder: &dyn Embedder,
) -> Result<ComparisonReport> {
    if candidates.is_empty() {
        bail!("at least one model is required");
    }
    if repeats == 0 {
        bail!("repeat count must be at least 1");
    }

    let mut compared = Vec::new();
    for (idx, pair) in turns.windows(2).enumerate() {
        let (user, expected) = (&pair[0], &pair[1]);
        if user.role != Role::User || expected.role != Role::Assistant {
            continue;
        }
        let context = &turns[..=idx];

        let mut generated = Vec::new();
        for candidate in candidates {
            for _ in 0..repeats {
                let reply = candidate
                    .provider
                    .complete(context)
                    .with_context(|| format!("turn {idx}: request reply from {}", candidate.model))?;
                debug!(message_index = idx, model = candidate.model, "reply generated");
                generated.push((candidate.model, reply));
            }
        }

        let mut inputs = Vec::with_capacity(generated.len() + 1);
        inputs.push(expected.content.clone());
        inputs.extend(generated.iter().map(|(_, reply)| reply.clone()));
        let vectors = embedder
            .embed(&inputs)
            .with_context(|| format!("turn {idx}: embed replies"))?;
        if vectors.len() != inputs.len() {
            bail!(
                "turn {idx}: got {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            );
        }
        let (reference, scored) = vectors
            .split_first()
            .ok_or_else(|| anyhow!("turn {idx}: no reference vector"))?;

        let replies = generated
            .into_iter()
            .zip(scored)
            .map(|((model, reply), vector)| {
                Ok(ModelReply {
                    model: model.to_string(),
                    reply,
                    similarity: cosine_similarity(reference, vector)
                        .with_context(|| format!("turn {idx}: score reply from {model}"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(message_index = idx, replies = replies.len(), "turn compared");
        compared.push(TurnComparison {
            message_index: idx,
            user: user.content.clone(),
            expected: expected.content.clone(),
            replies,
        });
    }

    if compared.is_empty() {
        bail!("transcript has no user turn followed by an assistant reply");
    }
    Ok(ComparisonReport { turns: compared })
}
