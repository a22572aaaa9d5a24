//! # Category and Difficulty Selection
//!
//! Pure pieces of the selection policy. The history-driven variant needs a
//! model call and lives on the agent; this module only parses its answers.

use crate::category::{Category, Difficulty};
use crate::error::{TipError, TipResult};
use chrono::Weekday;
use rand::Rng;

/// Which category the scheduled post and `!ai-tips` use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    WeekdayRotation,
    #[default]
    Random,
    Recommended,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::WeekdayRotation => "weekday",
            SelectionPolicy::Random => "random",
            SelectionPolicy::Recommended => "recommended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weekday" => Some(SelectionPolicy::WeekdayRotation),
            "random" => Some(SelectionPolicy::Random),
            "recommended" | "ai" => Some(SelectionPolicy::Recommended),
            _ => None,
        }
    }
}

pub fn weekday_category(day: Weekday) -> Category {
    match day {
        Weekday::Mon | Weekday::Thu | Weekday::Sat => Category::Frontend,
        Weekday::Tue | Weekday::Fri => Category::Backend,
        Weekday::Wed | Weekday::Sun => Category::Fullstack,
    }
}

pub fn random_category<R: Rng>(rng: &mut R) -> Category {
    Category::ALL[rng.random_range(0..Category::ALL.len())]
}

/// Matches a single-word model answer such as `"BACKEND"` or `"**Fullstack**."`.
pub fn parse_category_answer(answer: &str) -> TipResult<Category> {
    let cleaned: String = answer
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_uppercase();

    match cleaned.as_str() {
        "FRONTEND" => Ok(Category::Frontend),
        "BACKEND" => Ok(Category::Backend),
        "FULLSTACK" => Ok(Category::Fullstack),
        _ => Err(TipError::Selection(answer.trim().to_string())),
    }
}

/// Keyword search over a free-form answer. Falls back to medium.
pub fn parse_difficulty_answer(answer: &str) -> Difficulty {
    let lower = answer.to_lowercase();
    if lower.contains("beginner") || lower.contains("nybörjare") {
        Difficulty::Beginner
    } else if lower.contains("advanced") || lower.contains("avancerad") {
        Difficulty::Advanced
    } else {
        Difficulty::Medium
    }
}
