//! # Quality Verifier
//!
//! Second-opinion review of a candidate tip by another model. The gate is
//! advisory: when the reviewer cannot be reached or its answer cannot be
//! understood, the candidate is approved with a zero score.

use crate::category::{Category, Difficulty};
use crate::error::TipError;
use crate::llm::{GenerationOptions, TextGenerator};
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

/// Total score at or above which a review without an explicit verdict passes.
pub const APPROVAL_THRESHOLD: f64 = 7.0;

const REJECTION_PHRASES: &[&str] = &[
    "not approved",
    "\"approved\": false",
    "\"approved\":false",
    "approved: false",
    "rejected",
    "reject",
    "is a duplicate",
];

/// Fields the reviewer is asked to return. All optional: models drop keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Assessment {
    pub uniqueness: Option<f64>,
    pub relevance: Option<f64>,
    pub correctness: Option<f64>,
    pub difficulty_match: Option<f64>,
    pub total_score: Option<f64>,
    pub approved: Option<bool>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub approved: bool,
    pub reason: String,
    pub score: f64,
}

impl Verdict {
    fn fail_open(reason: impl Into<String>) -> Self {
        Verdict {
            approved: true,
            reason: reason.into(),
            score: 0.0,
        }
    }

    fn from_assessment(assessment: Assessment) -> Self {
        let score = assessment.total_score.unwrap_or(0.0);
        Verdict {
            approved: assessment.approved.unwrap_or(score >= APPROVAL_THRESHOLD),
            reason: assessment
                .reason
                .unwrap_or_else(|| "No reason given".to_string()),
            score,
        }
    }
}

type ParseStrategy = fn(&str) -> Option<Assessment>;

/// Tried in order; the first strategy that yields an assessment wins.
const PARSE_STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("embedded", parse_embedded),
    ("keywords", sniff_rejection),
];

fn parse_direct(response: &str) -> Option<Assessment> {
    serde_json::from_str(response.trim()).ok()
}

fn parse_fenced(response: &str) -> Option<Assessment> {
    let trimmed = response.trim();
    let body = trimmed.strip_prefix("```")?.strip_suffix("```")?;
    // Drop a language tag such as `json` on the opening fence line.
    let body = match body.split_once('\n') {
        Some((tag, rest)) if !tag.trim_start().starts_with('{') => rest,
        _ => body,
    };
    parse_direct(body)
}

fn parse_embedded(response: &str) -> Option<Assessment> {
    let pattern = Regex::new(r"(?s)\{.*\}").ok()?;
    let span = pattern.find(response)?;
    parse_direct(span.as_str())
}

fn sniff_rejection(response: &str) -> Option<Assessment> {
    let lower = response.to_lowercase();
    REJECTION_PHRASES
        .iter()
        .find(|phrase| lower.contains(*phrase))
        .map(|phrase| Assessment {
            approved: Some(false),
            reason: Some(format!("Reviewer answer mentioned {:?}", phrase)),
            ..Default::default()
        })
}

/// Runs the parse strategies over a raw reviewer answer.
pub fn parse_assessment(response: &str) -> Option<(&'static str, Assessment)> {
    PARSE_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(response).map(|a| (*name, a)))
}

pub fn review_prompt(candidate: &str, category: Category, difficulty: Difficulty, previous: &[String]) -> String {
    let previous_list = previous
        .iter()
        .enumerate()
        .map(|(i, tip)| format!("{}. {}", i + 1, tip))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You review programming tips in {category} development. \
        Decide whether the following tip is suitable to send to our users.\n\n\
        NEW TIP:\n\"\"\"\n{candidate}\n\"\"\"\n\n\
        Earlier tips in the same category:\n{previous_list}\n\n\
        Difficulty: {difficulty}\n\n\
        Rate the tip on a scale of 1-10 for each criterion:\n\
        1. UNIQUENESS: Is it different enough from the earlier tips? (1 = duplicate, 10 = entirely new information)\n\
        2. RELEVANCE: Is it relevant for {category} developers today? (1 = irrelevant, 10 = highly relevant)\n\
        3. CORRECTNESS: Is it technically correct? (1 = wrong, 10 = fully correct)\n\
        4. DIFFICULTY: Does it match the \"{difficulty}\" level? (1 = wrong level, 10 = perfect level)\n\n\
        Answer ONLY with a JSON object in this format:\n\
        {{\n\
            \"uniqueness\": x,\n\
            \"relevance\": x,\n\
            \"correctness\": x,\n\
            \"difficulty_match\": x,\n\
            \"total_score\": x,\n\
            \"approved\": true/false,\n\
            \"reason\": \"short explanation of the decision\"\n\
        }}"
    )
}

/// Reviews candidates with a secondary model.
#[derive(Clone)]
pub struct Verifier {
    reviewer: Arc<dyn TextGenerator>,
}

impl Verifier {
    pub fn new(reviewer: Arc<dyn TextGenerator>) -> Self {
        Verifier { reviewer }
    }

    pub async fn verify(
        &self,
        candidate: &str,
        category: Category,
        difficulty: Difficulty,
        previous: &[String],
    ) -> Verdict {
        let prompt = review_prompt(candidate, category, difficulty, previous);

        let response = match self.reviewer.generate(&prompt, &GenerationOptions::default()).await {
            Ok(response) => response,
            Err(e) => {
                let err = TipError::Verification(e.to_string());
                warn!("⚠️ Tip verification unavailable, letting tip through: {}", err);
                return Verdict::fail_open("Verification could not be performed");
            }
        };

        match parse_assessment(&response) {
            Some((strategy, assessment)) => {
                debug!("Verifier answer parsed with {} strategy: {:?}", strategy, assessment);
                let verdict = Verdict::from_assessment(assessment);
                info!(
                    "🔎 {} tip verification: approved={} score={} ({})",
                    category, verdict.approved, verdict.score, verdict.reason
                );
                verdict
            }
            None => {
                let err = TipError::Verification("unparseable reviewer answer".to_string());
                warn!("⚠️ {}, letting tip through. Raw answer: {}", err, response);
                Verdict::fail_open("Could not interpret the verification answer")
            }
        }
    }
}
