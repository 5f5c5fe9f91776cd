//! Reply service error types

use thiserror::Error;

/// Reply service error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ReplyError {
    pub kind: ReplyErrorKind,
    pub message: String,
}

impl ReplyError {
    pub fn new(kind: ReplyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::RemoteUnavailable, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::MalformedResponse, message)
    }
}

/// Failure classification, kept separate from the generic user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorKind {
    /// Transport failure or timeout
    RemoteUnavailable,
    /// Body could not be parsed as the expected payload
    MalformedResponse,
}

impl ReplyErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteUnavailable => "remote_unavailable",
            Self::MalformedResponse => "malformed_response",
        }
    }
}
