//! Pure screen transition function

use super::{Effect, Event, Screen, ScreenContext};
use super::state::MenuItem;
use crate::session::LeadInfo;
use thiserror::Error;

/// Result of a screen transition
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionResult {
    pub new_state: Screen,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Screen) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Adds a screen notification only when the screen actually changes
    fn notify_from(self, old: Screen) -> Self {
        if self.new_state == old {
            self
        } else {
            let screen = self.new_state;
            self.with_effect(Effect::NotifyScreen { screen })
        }
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Please enter {field}.")]
    MissingLeadField { field: &'static str },
    #[error("Messages can only be sent from the chat screen")]
    NotInChat,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs and performs no
/// I/O; persistence and dispatch happen when the runtime executes the effects.
pub fn transition(
    state: Screen,
    context: &ScreenContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Re-opening lands on chat when the lead is known, intro otherwise.
        // The transcript is untouched either way.
        (_, Event::WidgetOpened) => {
            let target = if context.has_lead() {
                Screen::Chat
            } else {
                Screen::Intro
            };
            Ok(TransitionResult::new(target).notify_from(state))
        }

        (Screen::Intro, Event::TopicSelected { topic }) => {
            let topic = topic.trim();
            if topic.is_empty() {
                return Ok(TransitionResult::new(state));
            }
            if context.has_lead() {
                Ok(TransitionResult::new(Screen::Chat)
                    .notify_from(state)
                    .with_effect(Effect::send_user_message(topic)))
            } else {
                Ok(TransitionResult::new(Screen::Form)
                    .notify_from(state)
                    .with_effect(Effect::stash_prompt(topic)))
            }
        }

        (_, Event::TopicSelected { .. }) => Err(TransitionError::InvalidTransition(format!(
            "help topics are only offered on the intro screen, not {}",
            state.as_str()
        ))),

        (Screen::Form, Event::LeadSubmitted { name, email }) => {
            let lead = validate_lead(&name, &email)?;
            let announcement = lead.announcement(context.pending_prompt.as_deref());

            let mut result = TransitionResult::new(Screen::Chat)
                .notify_from(state)
                .with_effect(Effect::SaveLead(lead))
                .with_effect(Effect::SendAnnouncement { text: announcement });
            if context.pending_prompt.is_some() {
                result = result.with_effect(Effect::ClearPrompt);
            }
            Ok(result)
        }

        (_, Event::LeadSubmitted { .. }) => Err(TransitionError::InvalidTransition(format!(
            "lead form is not open on the {} screen",
            state.as_str()
        ))),

        (_, Event::Navigate { item }) => {
            let target = match item {
                MenuItem::Home => Screen::Intro,
                MenuItem::BookMeeting => Screen::Appointment,
                MenuItem::Messages if context.has_lead() => Screen::Chat,
                MenuItem::Messages => Screen::Form,
            };
            Ok(TransitionResult::new(target).notify_from(state))
        }

        (Screen::Chat, Event::UserMessage { text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(TransitionResult::new(state));
            }
            Ok(TransitionResult::new(state).with_effect(Effect::send_user_message(text)))
        }

        (_, Event::UserMessage { .. }) => Err(TransitionError::NotInChat),
    }
}

fn validate_lead(name: &str, email: &str) -> Result<LeadInfo, TransitionError> {
    let (name, email) = (name.trim(), email.trim());
    match (name.is_empty(), email.is_empty()) {
        (true, true) => Err(TransitionError::MissingLeadField {
            field: "name and email",
        }),
        (true, false) => Err(TransitionError::MissingLeadField { field: "name" }),
        (false, true) => Err(TransitionError::MissingLeadField { field: "email" }),
        (false, false) => Ok(LeadInfo::new(name, email)),
    }
}
