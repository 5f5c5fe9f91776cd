//! Wire types for the reply-generation endpoint

use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// Literal two-character sequence separating reply fragments
pub const FRAGMENT_DELIMITER: &str = "\\k";

/// Request body: `{ "chat_ID": ..., "message": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyRequest {
    #[serde(rename = "chat_ID")]
    pub chat_id: String,
    pub message: String,
}

impl ReplyRequest {
    pub fn new(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self {
            chat_id: session_id.as_str().to_string(),
            message: message.into(),
        }
    }
}

/// Response body. A missing `reply` reads as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyPayload {
    #[serde(default)]
    pub reply: Option<String>,
}

impl ReplyPayload {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    /// Non-empty fragments in payload order
    pub fn fragments(&self) -> Vec<String> {
        split_fragments(self.reply.as_deref().unwrap_or_default())
    }
}

/// Split on the delimiter, trim each piece, and drop the empty ones
pub fn split_fragments(reply: &str) -> Vec<String> {
    reply
        .split(FRAGMENT_DELIMITER)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}
