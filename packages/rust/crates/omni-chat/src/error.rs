//! Error types for session mutation and conversation turns.
//!
//! Library code returns these `thiserror` enums; binary setup code wraps them in `anyhow`.

use std::time::Duration;

use thiserror::Error;

/// Malformed input, rejected before any session is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Session identifier is empty after trimming.
    #[error("session_id must be non-empty")]
    EmptySessionId,

    /// Turn content is empty after trimming.
    #[error("message must be non-empty")]
    EmptyContent,

    /// Role is neither `user` nor `assistant`.
    #[error("invalid turn role `{0}` (expected user|assistant)")]
    InvalidRole(String),
}

/// Failures reported by a reply generator.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Network or protocol failure talking to the inference endpoint.
    #[error("inference transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Inference endpoint answered with a non-success status (quota, auth, ...).
    #[error("inference API error {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Response body could not be interpreted.
    #[error("malformed inference response: {0}")]
    Malformed(String),

    /// Model returned no usable text.
    #[error("inference response contained an empty reply")]
    EmptyReply,
}

/// Outcome of a failed conversation turn.
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("reply generation failed: {0}")]
    GenerationFailure(#[from] GenerationError),

    #[error("reply generation timed out after {0:?}")]
    GenerationTimeout(Duration),
}

impl ConversationError {
    /// Timeouts are reported separately so callers may retry the same message.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationTimeout(_))
    }
}
