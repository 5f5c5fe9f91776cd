//! Conversation transcript
//!
//! The in-memory transcript is authoritative for the current view. Every
//! append rewrites the full sequence under the session's transcript key; a
//! failed write is logged and otherwise ignored so delivery never stops.
//!
//! A stored transcript that cannot be read is never overwritten. It is first
//! copied to a backup key; if that copy fails, writes are skipped for the
//! lifetime of the store.

use crate::db::{DbResult, KeyValueStore};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Bot,
}

/// One transcript entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub origin: Origin,
    pub text: String,
    /// Free-form annotation, carried through untouched
    #[serde(default)]
    pub feedback: Option<serde_json::Value>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
            feedback: None,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Bot,
            text: text.into(),
            feedback: None,
        }
    }
}

/// Ordered message log for one session
pub struct ConversationStore {
    session_id: SessionId,
    kv: Arc<dyn KeyValueStore>,
    messages: Vec<Message>,
    /// Cleared when an unreadable transcript could not be backed up
    writable: bool,
}

impl ConversationStore {
    /// Reload the persisted transcript; an unreadable one starts empty
    pub fn open(session_id: SessionId, kv: Arc<dyn KeyValueStore>) -> Self {
        let (messages, writable) = match load(kv.as_ref(), &session_id) {
            Ok(messages) => (messages, true),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Failed to load transcript, starting empty"
                );
                (Vec::new(), back_up_unreadable(kv.as_ref(), &session_id))
            }
        };
        tracing::debug!(session_id = %session_id, count = messages.len(), "Transcript loaded");
        Self {
            session_id,
            kv,
            messages,
            writable,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append and persist the whole sequence
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        if let Err(e) = self.persist() {
            tracing::warn!(
                session_id = %self.session_id,
                count = self.messages.len(),
                error = %e,
                "Failed to persist transcript"
            );
        }
    }

    fn persist(&self) -> DbResult<()> {
        if !self.writable {
            tracing::debug!(session_id = %self.session_id, "Transcript persistence disabled");
            return Ok(());
        }
        let json = serde_json::to_string(&self.messages)?;
        self.kv.set(&self.session_id.transcript_key(), &json)
    }
}

/// Key holding a transcript that could not be read back
pub fn backup_key(session_id: &SessionId) -> String {
    format!("{}_unreadable", session_id.transcript_key())
}

/// Copy the raw stored transcript aside. Returns whether the transcript key
/// is now safe to overwrite.
fn back_up_unreadable(kv: &dyn KeyValueStore, session_id: &SessionId) -> bool {
    let result = kv
        .get(&session_id.transcript_key())
        .and_then(|raw| match raw {
            Some(raw) => kv.set(&backup_key(session_id), &raw),
            None => Ok(()),
        });
    match result {
        Ok(()) => {
            tracing::warn!(
                session_id = %session_id,
                backup_key = %backup_key(session_id),
                "Unreadable transcript moved aside"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                session_id = %session_id,
                error = %e,
                "Could not back up unreadable transcript, not persisting this session"
            );
            false
        }
    }
}

/// Read the persisted transcript for a session, empty if none was written
pub fn load(kv: &dyn KeyValueStore, session_id: &SessionId) -> DbResult<Vec<Message>> {
    match kv.get(&session_id.transcript_key())? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}
