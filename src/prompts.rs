//! # Prompt Builder
//!
//! Pure functions from a prompt kind plus recent history to prompt text.
//! The only randomness is the seed the caller passes in, which is written
//! into tip prompts verbatim to nudge the model toward different samples.

use crate::category::{Category, Difficulty};
use crate::database::Reflection;
use crate::error::{TipError, TipResult};
use crate::memory::{CategoryStats, TipSummary};

/// Characters of a past tip or reflection quoted back into a prompt.
pub const PREVIEW_CHARS: usize = 100;
/// Past tips per category shown to the tip prompt.
pub const TIP_CONTEXT: usize = 3;
/// Past tips per category shown to the category recommendation prompt.
pub const RECOMMENDATION_CONTEXT: usize = 5;
/// Past tips shown to the difficulty prompt.
pub const DIFFICULTY_CONTEXT: usize = 7;
/// Past reflections shown to the difficulty prompt.
pub const REFLECTION_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    CategoryRecommendation,
    DifficultySelection,
    Tip(Category),
}

impl PromptKind {
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::CategoryRecommendation => "category-recommendation",
            PromptKind::DifficultySelection => "difficulty-selection",
            PromptKind::Tip(Category::Frontend) => "frontend-tip",
            PromptKind::Tip(Category::Backend) => "backend-tip",
            PromptKind::Tip(Category::Fullstack) => "fullstack-tip",
        }
    }

    pub fn parse(name: &str) -> TipResult<Self> {
        match name {
            "category-recommendation" => Ok(PromptKind::CategoryRecommendation),
            "difficulty-selection" => Ok(PromptKind::DifficultySelection),
            "frontend-tip" => Ok(PromptKind::Tip(Category::Frontend)),
            "backend-tip" => Ok(PromptKind::Tip(Category::Backend)),
            "fullstack-tip" => Ok(PromptKind::Tip(Category::Fullstack)),
            other => Err(TipError::InvalidArgument(format!("unknown prompt kind: {}", other))),
        }
    }
}

/// History handed to the builder. Each kind reads only the fields it needs.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    /// Required by [`PromptKind::DifficultySelection`].
    pub category: Option<Category>,
    pub difficulty: Difficulty,
    pub seed: u32,
    /// Newest first, any category; the builder filters.
    pub recent_tips: &'a [TipSummary],
    pub reflections: &'a [Reflection],
    /// Required by [`PromptKind::CategoryRecommendation`].
    pub stats: Option<&'a CategoryStats>,
}

pub fn build_prompt(kind: PromptKind, context: &PromptContext<'_>) -> TipResult<String> {
    match kind {
        PromptKind::CategoryRecommendation => {
            let stats = context.stats.ok_or_else(|| {
                TipError::InvalidArgument("category recommendation needs category stats".to_string())
            })?;
            Ok(category_recommendation_prompt(context.recent_tips, stats))
        }
        PromptKind::DifficultySelection => {
            let category = context.category.ok_or_else(|| {
                TipError::InvalidArgument("difficulty selection needs a category".to_string())
            })?;
            Ok(difficulty_prompt(category, context.recent_tips, context.reflections))
        }
        PromptKind::Tip(category) => Ok(tip_prompt(
            category,
            context.difficulty,
            context.seed,
            context.recent_tips,
        )),
    }
}

/// First `PREVIEW_CHARS` characters of `text`, marked with an ellipsis.
pub fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}

fn in_category<'a>(tips: &'a [TipSummary], category: Category, limit: usize) -> impl Iterator<Item = &'a TipSummary> {
    tips.iter().filter(move |t| t.category == category).take(limit)
}

fn category_recommendation_prompt(recent_tips: &[TipSummary], stats: &CategoryStats) -> String {
    let mut prompt = String::from(
        "You are a bot that decides which kind of programming tip should be posted today. \
        Based on the most recent tips (see below) and how often each category has appeared, \
        choose whether today's tip should be about FRONTEND, BACKEND or FULLSTACK. \
        Pick the category that has received the least attention lately or needs more variety. \
        Answer ONLY with one of: FRONTEND, BACKEND or FULLSTACK.\n\nCategory statistics:",
    );

    for category in Category::ALL {
        let stat = stats.get(category);
        let last = stat
            .last_sent
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        prompt.push_str(&format!("\n{}: {} tips (last: {})", category, stat.count, last));
    }

    for category in Category::ALL {
        prompt.push_str(&format!("\n\nRecent {} tips:", category));
        for tip in in_category(recent_tips, category, RECOMMENDATION_CONTEXT) {
            prompt.push_str(&format!("\n- {}", preview(&tip.text)));
        }
    }

    prompt
}

fn difficulty_prompt(category: Category, recent_tips: &[TipSummary], reflections: &[Reflection]) -> String {
    let mut prompt = format!(
        "You are an agent responsible for choosing the difficulty of {} tips. \
        Based on earlier tips and reflections, choose whether today's tip should be at \
        BEGINNER, MEDIUM or ADVANCED level. \
        Try to vary the difficulty over time, but also take into account what seems to work best.\
        \n\nRecent tips in this category:",
        category
    );

    for tip in in_category(recent_tips, category, DIFFICULTY_CONTEXT) {
        prompt.push_str(&format!("\n- {}: {}", tip.difficulty, preview(&tip.text)));
    }

    prompt.push_str("\n\nEarlier reflections:");
    for reflection in reflections
        .iter()
        .filter(|r| r.category == category)
        .take(REFLECTION_CONTEXT)
    {
        prompt.push_str(&format!("\n- {}", preview(&reflection.reflection)));
    }

    prompt.push_str("\n\nAnswer ONLY with one of: BEGINNER, MEDIUM or ADVANCED.");
    prompt
}

type Vocabulary = &'static [(&'static str, &'static [&'static str])];

// (label, keywords) pairs recognised in past tips. A keyword matches a word
// exactly, or as a prefix when it is at least four characters long.
const FRONTEND_SUBTOPICS: Vocabulary = &[
    ("CSS", &["css"]),
    ("JavaScript", &["javascript", "js"]),
    ("React", &["react"]),
    ("Vue", &["vue"]),
    ("Angular", &["angular"]),
];

const BACKEND_SUBTOPICS: Vocabulary = &[
    ("database", &["database", "databas", "sql"]),
    ("API", &["api", "apis"]),
    ("security", &["security", "säkerhet"]),
    ("Node.js", &["node"]),
];

const FULLSTACK_SUBTOPICS: Vocabulary = &[
    ("integration", &["integration"]),
    ("scalability", &["scalab", "skalbar"]),
    ("performance", &["performance", "prestanda"]),
    ("deployment", &["deploy"]),
];

fn subtopics(category: Category) -> Vocabulary {
    match category {
        Category::Frontend => FRONTEND_SUBTOPICS,
        Category::Backend => BACKEND_SUBTOPICS,
        Category::Fullstack => FULLSTACK_SUBTOPICS,
    }
}

fn keyword_matches(word: &str, keyword: &str) -> bool {
    word == keyword || (keyword.chars().count() >= 4 && word.starts_with(keyword))
}

/// Sub-topic labels that appear in any of `tips`, in vocabulary order.
pub fn recent_subtopics(category: Category, tips: &[TipSummary]) -> Vec<&'static str> {
    let words: Vec<String> = tips
        .iter()
        .filter(|t| t.category == category)
        .take(TIP_CONTEXT)
        .flat_map(|t| {
            t.text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();

    subtopics(category)
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|kw| words.iter().any(|w| keyword_matches(w, kw)))
        })
        .map(|(label, _)| *label)
        .collect()
}

fn tip_prompt(category: Category, difficulty: Difficulty, seed: u32, recent_tips: &[TipSummary]) -> String {
    let avoid: String = recent_subtopics(category, recent_tips)
        .iter()
        .map(|topic| format!("Avoid {} tips if possible since they were covered recently. ", topic))
        .collect();

    let ask = match category {
        Category::Frontend => format!(
            "Give exactly 3 useful, {} and lesser-known tips on frontend development that suit students. ",
            difficulty
        ),
        Category::Backend => format!(
            "Give exactly 3 {} and educational tips on backend development that suit beginners or students. ",
            difficulty
        ),
        Category::Fullstack => format!(
            "Give exactly 3 {} tips, tricks, techniques or trends in fullstack development (both frontend and backend) that are relevant today. ",
            difficulty
        ),
    };

    format!(
        "{}{}Each tip must be at most 2 sentences long. \
        Finish by briefly explaining 1 fundamental {} concept in at most 3 sentences. \
        Answer without a greeting and keep the whole answer short, 12 sentences at most. \
        Random seed: {}",
        ask, avoid, category, seed
    )
}

/// Prompt for the post-hoc critique stored after each generation.
pub fn reflection_prompt(tip: &str, category: Category) -> String {
    format!(
        "Analyse this {} tip that was just posted: \"{}\". \
        What was good about it? What could be improved next time? \
        Which topics should be covered next time?",
        category, tip
    )
}

/// Prompt asking the model to explain a category/difficulty choice.
pub fn reasoning_prompt(category: Category, difficulty: Difficulty) -> String {
    format!(
        "You are an agent responsible for generating programming tips. \
        The category chosen for the next tip is {} with {} difficulty. \
        Explain what is interesting about this category: \
        1. Why this difficulty may be suitable. \
        2. Which kinds of concepts are worth learning in this category. \
        3. What the next step is to improve future tips.",
        category.as_str().to_uppercase(),
        difficulty
    )
}
