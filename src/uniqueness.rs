//! # Uniqueness and Retry Loop
//!
//! Drives the generator until it produces a tip that is new for its
//! category and, when a verifier is configured, approved by it. The loop is
//! bounded so a stubborn model cannot run up cost or latency.

use crate::agent::Stage;
use crate::category::{Category, Difficulty};
use crate::database::{normalize_tip, NewTip, StoredTip, TipStore};
use crate::error::{TipError, TipResult};
use crate::llm::{GenerationOptions, TextGenerator};
use crate::memory::TipSummary;
use crate::prompts::{build_prompt, PromptContext, PromptKind, RECOMMENDATION_CONTEXT};
use crate::verifier::Verifier;
use log::{debug, info, warn};
use rand::Rng;

pub const MAX_ATTEMPTS: usize = 5;

/// Upper bound (exclusive) of the seed written into each tip prompt.
const SEED_RANGE: u32 = 100_000;

/// Why the loop gave up on its last candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    Duplicate,
    Rejected,
}

#[derive(Debug)]
pub enum LoopOutcome {
    /// Stored. `display` is the candidate as generated, before normalization.
    Accepted {
        tip: StoredTip,
        display: String,
        attempts: usize,
    },
    /// Every attempt was a duplicate or rejected. Nothing was stored.
    Exhausted {
        candidate: String,
        reason: Exhaustion,
        attempts: usize,
    },
    /// The generator never produced usable text.
    Empty { attempts: usize },
    /// A unique candidate was found but could not be written.
    Unpersisted {
        candidate: String,
        attempts: usize,
        error: TipError,
    },
}

impl LoopOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            LoopOutcome::Accepted { attempts, .. }
            | LoopOutcome::Exhausted { attempts, .. }
            | LoopOutcome::Empty { attempts }
            | LoopOutcome::Unpersisted { attempts, .. } => *attempts,
        }
    }

    /// Text to post, if any attempt produced some.
    pub fn display_text(&self) -> Option<&str> {
        match self {
            LoopOutcome::Accepted { display, .. } => Some(display),
            LoopOutcome::Exhausted { candidate, .. } | LoopOutcome::Unpersisted { candidate, .. } => {
                Some(candidate)
            }
            LoopOutcome::Empty { .. } => None,
        }
    }
}

/// One bounded search for a new tip. Borrowed collaborators only; the agent
/// builds a fresh loop per request.
pub struct UniqueTipLoop<'a> {
    pub generator: &'a dyn TextGenerator,
    pub store: &'a dyn TipStore,
    pub verifier: Option<&'a Verifier>,
    pub temperature: f32,
    pub topics: &'a [String],
}

impl<'a> UniqueTipLoop<'a> {
    /// Only a failing duplicate lookup is returned as an error. Every other
    /// failure is folded into the outcome.
    pub async fn run(
        &self,
        category: Category,
        difficulty: Difficulty,
        recent_tips: &[TipSummary],
    ) -> TipResult<LoopOutcome> {
        let peers: Vec<String> = recent_tips
            .iter()
            .filter(|t| t.category == category)
            .take(RECOMMENDATION_CONTEXT)
            .map(|t| t.text.clone())
            .collect();
        let options = GenerationOptions::with_temperature(self.temperature);
        let mut last_rejected: Option<(String, Exhaustion)> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let seed = rand::rng().random_range(0..SEED_RANGE);
            let context = PromptContext {
                difficulty,
                seed,
                recent_tips,
                ..Default::default()
            };
            Stage::BuildingPrompt.log(category);
            let prompt = build_prompt(PromptKind::Tip(category), &context)?;

            debug!("🔁 {} tip attempt {}/{} (seed {})", category, attempt, MAX_ATTEMPTS, seed);
            let candidate = match self.generator.generate(&prompt, &options).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    warn!("⚠️ Attempt {}: generator returned blank text", attempt);
                    continue;
                }
                Err(e) => {
                    warn!("⚠️ Attempt {}: {}", attempt, e);
                    continue;
                }
            };

            if self.store.tip_exists(&candidate, category).await? {
                info!("♻️ Attempt {}: duplicate {} tip, retrying", attempt, category);
                last_rejected = Some((candidate, Exhaustion::Duplicate));
                continue;
            }

            let score = match self.verifier {
                Some(verifier) => {
                    Stage::Verifying.log(category);
                    let verdict = verifier.verify(&candidate, category, difficulty, &peers).await;
                    if !verdict.approved {
                        info!("🚫 Attempt {}: verifier rejected tip ({})", attempt, verdict.reason);
                        last_rejected = Some((candidate, Exhaustion::Rejected));
                        continue;
                    }
                    verdict.score
                }
                None => 0.0,
            };

            let new_tip = NewTip {
                text: normalize_tip(&candidate),
                category,
                difficulty,
                topics: self.topics.to_vec(),
                verification_score: score,
            };

            Stage::Persisting.log(category);
            match self.store.insert_tip(&new_tip).await {
                Ok(tip) => {
                    info!("✅ Stored {} tip #{} after {} attempt(s)", category, tip.id, attempt);
                    return Ok(LoopOutcome::Accepted {
                        tip,
                        display: candidate,
                        attempts: attempt,
                    });
                }
                Err(TipError::DuplicateContent { .. }) => {
                    info!("♻️ Attempt {}: {} tip stored concurrently, retrying", attempt, category);
                    last_rejected = Some((candidate, Exhaustion::Duplicate));
                }
                Err(error) => {
                    return Ok(LoopOutcome::Unpersisted {
                        candidate,
                        attempts: attempt,
                        error,
                    })
                }
            }
        }

        Ok(match last_rejected {
            Some((candidate, reason)) => {
                warn!(
                    "⚠️ No acceptable {} tip after {} attempts ({:?}), not storing the last candidate",
                    category, MAX_ATTEMPTS, reason
                );
                LoopOutcome::Exhausted {
                    candidate,
                    reason,
                    attempts: MAX_ATTEMPTS,
                }
            }
            None => LoopOutcome::Empty {
                attempts: MAX_ATTEMPTS,
            },
        })
    }
}
