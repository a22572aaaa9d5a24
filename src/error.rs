use crate::category::Category;
use thiserror::Error;

/// Failures that can surface inside the tip pipeline.
///
/// Most of these never reach a chat user: the agent degrades to fallback text
/// instead. They exist so each stage can say precisely what went wrong.
#[derive(Debug, Error)]
pub enum TipError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("tip already exists in the {category} category")]
    DuplicateContent { category: Category },

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("unrecognised selection answer: {0:?}")]
    Selection(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<sqlite::Error> for TipError {
    fn from(err: sqlite::Error) -> Self {
        TipError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for TipError {
    fn from(err: serde_json::Error) -> Self {
        TipError::Persistence(format!("bad JSON column: {}", err))
    }
}

pub type TipResult<T> = std::result::Result<T, TipError>;
