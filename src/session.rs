//! Session identity and lead-capture fields
//!
//! Everything here lives in the session-scoped [`KeyValueStore`] under the
//! same key names the widget has always used, so a transcript written by one
//! mount is picked up by the next one in the same session.

use crate::db::{DbResult, KeyValueStore};
use rand::distributions::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const SESSION_ID_KEY: &str = "chat_ID";
pub const NAME_KEY: &str = "chat_name";
pub const EMAIL_KEY: &str = "chat_email";
pub const PENDING_PROMPT_KEY: &str = "pending_prompt";

const TRANSCRIPT_KEY_PREFIX: &str = "chat_messages_";
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 8;

/// Opaque per-session conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Random `user_xxxxxxxx` token. Collisions are only statistically avoided.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let dist = Uniform::from(0..ID_ALPHABET.len());
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(ID_ALPHABET[rng.sample(dist)]))
            .collect();
        Self(format!("user_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this session's transcript is persisted
    pub fn transcript_key(&self) -> String {
        format!("{TRANSCRIPT_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name/email pair captured once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadInfo {
    pub name: String,
    pub email: String,
}

impl LeadInfo {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// First message sent once the lead form completes
    pub fn announcement(&self, pending_prompt: Option<&str>) -> String {
        let mut text = format!("User info: Name = {}, Email = {}", self.name, self.email);
        if let Some(prompt) = pending_prompt {
            text.push_str("\n\n");
            text.push_str(prompt);
        }
        text
    }
}

/// Greeting name: stored lead name with a capitalised first letter, or `Guest`
pub fn display_name(lead: Option<&LeadInfo>) -> String {
    let raw = lead.map_or("Guest", |l| l.name.as_str());
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Guest".to_string(),
    }
}

/// Typed access to the widget's session keys
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Return the stored identity, creating and persisting one on first use.
    ///
    /// A failed read or write still yields a usable identity for this mount.
    pub fn get_or_create_session(&self) -> SessionId {
        match self.kv.get(SESSION_ID_KEY) {
            Ok(Some(existing)) if !existing.is_empty() => return SessionId(existing),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read session id"),
        }

        let id = SessionId::generate();
        if let Err(e) = self.kv.set(SESSION_ID_KEY, id.as_str()) {
            tracing::warn!(error = %e, session_id = %id, "Failed to persist session id");
        }
        tracing::info!(session_id = %id, "Created session");
        id
    }

    /// Lead info exists only when both fields are present and non-empty
    pub fn lead(&self) -> DbResult<Option<LeadInfo>> {
        let name = self.kv.get(NAME_KEY)?.filter(|v| !v.is_empty());
        let email = self.kv.get(EMAIL_KEY)?.filter(|v| !v.is_empty());
        Ok(name.zip(email).map(|(name, email)| LeadInfo { name, email }))
    }

    pub fn save_lead(&self, lead: &LeadInfo) -> DbResult<()> {
        self.kv.set(NAME_KEY, &lead.name)?;
        self.kv.set(EMAIL_KEY, &lead.email)
    }

    pub fn pending_prompt(&self) -> DbResult<Option<String>> {
        Ok(self.kv.get(PENDING_PROMPT_KEY)?.filter(|v| !v.is_empty()))
    }

    pub fn stash_prompt(&self, prompt: &str) -> DbResult<()> {
        self.kv.set(PENDING_PROMPT_KEY, prompt)
    }

    pub fn clear_prompt(&self) -> DbResult<()> {
        self.kv.remove(PENDING_PROMPT_KEY)
    }

    /// Remove every key the widget owns, ending the session
    pub fn clear(&self) -> DbResult<()> {
        if let Some(id) = self.kv.get(SESSION_ID_KEY)? {
            self.kv.remove(&SessionId(id).transcript_key())?;
        }
        for key in [SESSION_ID_KEY, NAME_KEY, EMAIL_KEY, PENDING_PROMPT_KEY] {
            self.kv.remove(key)?;
        }
        Ok(())
    }
}
