//! # Feature: Tip Agent
//!
//! Orchestrates one tip request end to end: pick a category and difficulty,
//! run the uniqueness loop, remember the result and reflect on it.
//!
//! Nothing here fails towards the caller. Every request ends with some text
//! to post, at worst a fixed apology.

use crate::category::{Category, Difficulty, TopicTags};
use crate::database::{normalize_tip, Reflection, TipStore};
use crate::error::TipResult;
use crate::llm::{GenerationOptions, TextGenerator};
use crate::memory::{AgentMemory, RECENT_TIPS_WINDOW, REFLECTIONS_WINDOW};
use crate::prompts::{build_prompt, reasoning_prompt, reflection_prompt, PromptContext, PromptKind};
use crate::selector::{parse_category_answer, parse_difficulty_answer, random_category, weekday_category, SelectionPolicy};
use crate::uniqueness::{LoopOutcome, UniqueTipLoop};
use crate::verifier::Verifier;
use chrono::{Datelike, SubsecRound, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Posted when every attempt came back blank.
pub const FALLBACK_TIP: &str =
    "No new tip could be generated right now. Keep practising what you learned last time and check back tomorrow!";
/// Posted when the pipeline itself broke.
pub const APOLOGY: &str = "Sorry, something went wrong while generating today's tip. Please try again later.";
pub const REASONING_APOLOGY: &str = "Sorry, I could not explain my reasoning right now. Please try again later.";

/// Pipeline position of a request, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectingCategory,
    BuildingPrompt,
    Generating,
    Verifying,
    Persisting,
    Reflecting,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SelectingCategory => "selecting category",
            Stage::BuildingPrompt => "building prompt",
            Stage::Generating => "generating",
            Stage::Verifying => "verifying",
            Stage::Persisting => "persisting",
            Stage::Reflecting => "reflecting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn log(&self, category: Category) {
        debug!("🧭 {} pipeline: {}", category, self.as_str());
    }
}

// Keeps the thread-local RNG out of async state.
fn surprise_category() -> Category {
    random_category(&mut rand::rng())
}

/// A finished tip ready for the chat adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTip {
    pub prefix: String,
    pub tip: String,
    pub category: Category,
    pub difficulty: Difficulty,
}

impl DailyTip {
    pub fn new(category: Category, difficulty: Difficulty, tip: impl Into<String>) -> Self {
        DailyTip {
            prefix: format!(
                "{} **Today's {} {} tip:**",
                category.emoji(),
                difficulty,
                category
            ),
            tip: tip.into(),
            category,
            difficulty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub policy: SelectionPolicy,
    pub temperature: f32,
    pub topics: TopicTags,
    pub timezone: Tz,
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            policy: SelectionPolicy::default(),
            temperature: 1.5,
            topics: TopicTags::default(),
            timezone: chrono_tz::Europe::Stockholm,
        }
    }
}

pub struct TipAgent {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn TipStore>,
    verifier: Option<Verifier>,
    settings: AgentSettings,
    memory: Mutex<AgentMemory>,
}

impl TipAgent {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn TipStore>,
        verifier: Option<Verifier>,
        settings: AgentSettings,
    ) -> Self {
        TipAgent {
            generator,
            store,
            verifier,
            settings,
            memory: Mutex::new(AgentMemory::default()),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.settings.policy
    }

    /// Rebuilds memory from the store.
    pub async fn initialize(&self) -> TipResult<()> {
        let tips = self.store.recent_tips(None, RECENT_TIPS_WINDOW).await?;
        let reflections = self.store.recent_reflections(REFLECTIONS_WINDOW).await?;
        let counts = self.store.category_stats().await?;

        let rebuilt = AgentMemory::rebuild(&tips, reflections, &counts);
        *self.memory.lock().await = rebuilt;

        info!(
            "🧠 Agent memory loaded: {} recent tips, {} categories with history",
            tips.len(),
            counts.len()
        );
        Ok(())
    }

    /// Asks the model which category needs attention. Frontend on any trouble.
    pub async fn recommend_category(&self) -> Category {
        let (recent, stats) = {
            let memory = self.memory.lock().await;
            (memory.recent_tips().cloned().collect::<Vec<_>>(), memory.stats().clone())
        };
        let context = PromptContext {
            recent_tips: &recent,
            stats: Some(&stats),
            ..Default::default()
        };

        let answer = match build_prompt(PromptKind::CategoryRecommendation, &context) {
            Ok(prompt) => self.generator.generate(&prompt, &GenerationOptions::default()).await,
            Err(e) => Err(e),
        };

        match answer.and_then(|a| parse_category_answer(&a)) {
            Ok(category) => {
                info!("🤖 Recommended category: {}", category);
                category
            }
            Err(e) => {
                warn!("⚠️ Category recommendation failed ({}), defaulting to frontend", e);
                Category::Frontend
            }
        }
    }

    /// Asks the model for a difficulty. Medium on any trouble.
    pub async fn determine_difficulty(&self, category: Category) -> Difficulty {
        let (recent, reflections) = {
            let memory = self.memory.lock().await;
            (
                memory.tips_in(category, RECENT_TIPS_WINDOW),
                memory.reflections_in(category, REFLECTIONS_WINDOW),
            )
        };
        let context = PromptContext {
            category: Some(category),
            recent_tips: &recent,
            reflections: &reflections,
            ..Default::default()
        };

        let answer = match build_prompt(PromptKind::DifficultySelection, &context) {
            Ok(prompt) => self.generator.generate(&prompt, &GenerationOptions::default()).await,
            Err(e) => Err(e),
        };

        match answer {
            Ok(answer) => {
                let difficulty = parse_difficulty_answer(&answer);
                info!("🎚️ Difficulty for {}: {}", category, difficulty);
                difficulty
            }
            Err(e) => {
                warn!("⚠️ Difficulty selection failed ({}), defaulting to medium", e);
                Difficulty::Medium
            }
        }
    }

    /// Applies the configured selection policy.
    pub async fn select_category(&self) -> Category {
        debug!(
            "🧭 pipeline: {} ({} policy)",
            Stage::SelectingCategory.as_str(),
            self.settings.policy.as_str()
        );
        match self.settings.policy {
            SelectionPolicy::WeekdayRotation => {
                weekday_category(Utc::now().with_timezone(&self.settings.timezone).weekday())
            }
            SelectionPolicy::Random => surprise_category(),
            SelectionPolicy::Recommended => self.recommend_category().await,
        }
    }

    pub async fn generate_frontend_tip(&self) -> DailyTip {
        self.generate_daily_tip(Some(Category::Frontend)).await
    }

    pub async fn generate_backend_tip(&self) -> DailyTip {
        self.generate_daily_tip(Some(Category::Backend)).await
    }

    pub async fn generate_fullstack_tip(&self) -> DailyTip {
        self.generate_daily_tip(Some(Category::Fullstack)).await
    }

    pub async fn generate_random_tip(&self) -> DailyTip {
        self.generate_daily_tip(Some(surprise_category())).await
    }

    /// Uses `category` when given, otherwise the selection policy.
    pub async fn generate_daily_tip(&self, category: Option<Category>) -> DailyTip {
        let category = match category {
            Some(category) => category,
            None => self.select_category().await,
        };
        let difficulty = self.determine_difficulty(category).await;

        match self.generate_tip(category, difficulty).await {
            Ok(text) => DailyTip::new(category, difficulty, text),
            Err(e) => {
                Stage::Failed.log(category);
                error!("❌ Tip generation for {} failed: {}", category, e);
                self.self_reflect(APOLOGY, Category::Frontend).await;
                DailyTip::new(Category::Frontend, Difficulty::Medium, APOLOGY)
            }
        }
    }

    /// Runs the uniqueness loop and reflects on whatever text it produced.
    /// Errors only when the store cannot be queried for duplicates.
    pub async fn generate_tip(&self, category: Category, difficulty: Difficulty) -> TipResult<String> {
        let recent: Vec<_> = {
            let memory = self.memory.lock().await;
            memory.recent_tips().cloned().collect()
        };

        Stage::Generating.log(category);
        let tip_loop = UniqueTipLoop {
            generator: self.generator.as_ref(),
            store: self.store.as_ref(),
            verifier: self.verifier.as_ref(),
            temperature: self.settings.temperature,
            topics: self.settings.topics.for_category(category),
        };
        let outcome = tip_loop.run(category, difficulty, &recent).await?;

        let text = match outcome {
            LoopOutcome::Accepted { tip, display, .. } => {
                self.memory.lock().await.record_tip(&tip);
                display
            }
            LoopOutcome::Exhausted { candidate, .. } => candidate,
            LoopOutcome::Unpersisted { candidate, error: e, .. } => {
                error!("❌ Could not store {} tip, posting it anyway: {}", category, e);
                candidate
            }
            LoopOutcome::Empty { attempts } => {
                warn!("⚠️ {} attempts produced no {} text, using fallback", attempts, category);
                FALLBACK_TIP.to_string()
            }
        };

        self.self_reflect(&text, category).await;
        Stage::Done.log(category);
        Ok(text)
    }

    /// Stores a critique of `tip`. Best effort: failures are logged only.
    pub async fn self_reflect(&self, tip: &str, category: Category) {
        Stage::Reflecting.log(category);
        let prompt = reflection_prompt(tip, category);

        let text = match self.generator.generate(&prompt, &GenerationOptions::default()).await {
            Ok(text) => text,
            Err(e) => {
                warn!("⚠️ Self-reflection skipped: {}", e);
                return;
            }
        };

        let reflection = Reflection {
            tip: normalize_tip(tip),
            reflection: text.trim().to_string(),
            category,
            date: Utc::now().trunc_subsecs(6),
        };

        if let Err(e) = self.store.insert_reflection(&reflection).await {
            warn!("⚠️ Could not store reflection: {}", e);
        }
        self.memory.lock().await.record_reflection(reflection);
    }

    /// Picks a category and difficulty and has the model explain the choice.
    pub async fn agent_reasoning(&self) -> String {
        let category = self.select_category().await;
        let difficulty = self.determine_difficulty(category).await;
        let prompt = reasoning_prompt(category, difficulty);

        match self.generator.generate(&prompt, &GenerationOptions::default()).await {
            Ok(text) if !text.trim().is_empty() => format!(
                "🧠 **Agent reasoning ({} / {}):**\n{}",
                category,
                difficulty,
                text.trim()
            ),
            Ok(_) => REASONING_APOLOGY.to_string(),
            Err(e) => {
                error!("❌ Agent reasoning failed: {}", e);
                REASONING_APOLOGY.to_string()
            }
        }
    }
}
