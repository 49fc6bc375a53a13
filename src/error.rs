//! Pipeline failures.
//!
//! Every variant is terminal for a capture attempt: the caller gets one
//! failure signal and no snapshot code. Individual binding reads that fail
//! are not errors at all, see [`crate::snapshot::Read::Skipped`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrapError {
    #[error("no application frame found in stack trace")]
    Resolution,
    #[error("failed to retrieve '{reference}': {message}")]
    Retrieval { reference: String, message: String },
    #[error("parse failure: {message}")]
    Parse { message: String },
}

impl TrapError {
    pub fn retrieval(reference: impl Into<String>, message: impl Into<String>) -> Self {
        TrapError::Retrieval {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        TrapError::Parse {
            message: message.into(),
        }
    }
}
