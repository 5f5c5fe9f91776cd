//! Effects produced by screen transitions

use super::state::Screen;
use crate::session::LeadInfo;

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist lead info for the session
    SaveLead(LeadInfo),

    /// Remember a topic until the lead form completes
    StashPrompt { prompt: String },

    /// Forget the stashed topic
    ClearPrompt,

    /// Echo as a user message, then dispatch
    SendUserMessage { text: String },

    /// Dispatch without echoing into the transcript
    SendAnnouncement { text: String },

    /// Tell observers the active screen changed
    NotifyScreen { screen: Screen },
}

impl Effect {
    pub fn send_user_message(text: impl Into<String>) -> Self {
        Effect::SendUserMessage { text: text.into() }
    }

    pub fn stash_prompt(prompt: impl Into<String>) -> Self {
        Effect::StashPrompt {
            prompt: prompt.into(),
        }
    }

    /// Text this effect hands to the dispatcher, if any
    pub fn dispatched_text(&self) -> Option<&str> {
        match self {
            Effect::SendUserMessage { text } | Effect::SendAnnouncement { text } => Some(text),
            _ => None,
        }
    }
}
