use thiserror::Error;

use crate::session::SessionStatus;

#[derive(Error, Debug, Clone)]
pub enum InterviewError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl InterviewError {
    pub fn session_not_found(id: &str) -> Self {
        InterviewError::NotFound(format!("session {}", id))
    }
}

impl From<serde_json::Error> for InterviewError {
    fn from(e: serde_json::Error) -> Self {
        InterviewError::Serialization(e.to_string())
    }
}
