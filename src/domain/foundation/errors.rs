//! Shared validation errors for domain value objects.

use thiserror::Error;

/// Errors raised when constructing domain value objects from caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyId(&'static str),

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("unknown vital: {0}")]
    UnknownVital(String),

    #[error("vital score {0} is out of range 1-10")]
    ScoreOutOfRange(u8),
}
