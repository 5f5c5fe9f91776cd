//! Screen state types

use crate::session::LeadInfo;
use serde::{Deserialize, Serialize};

/// Quick action shown above the help topics
pub const QUICK_ACTION: &str = "Send us a message";

/// Help topics offered on the intro screen
pub const HELP_TOPICS: [&str; 5] = [
    "About Patient Studio",
    "Services & Solutions",
    "Pricing & Plans",
    "Product Features & Bots",
    "Contact Human Support",
];

/// Active conversational mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Greeting with help topics
    #[default]
    Intro,
    /// Lead-capture form
    Form,
    /// Live chat
    Chat,
    /// Appointment booking form
    Appointment,
}

impl Screen {
    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Intro => "intro",
            Screen::Form => "form",
            Screen::Chat => "chat",
            Screen::Appointment => "appointment",
        }
    }
}

/// Entries of the persistent footer menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Home,
    Messages,
    BookMeeting,
}

impl MenuItem {
    pub fn label(self) -> &'static str {
        match self {
            MenuItem::Home => "Home",
            MenuItem::Messages => "Messages",
            MenuItem::BookMeeting => "Book Meeting",
        }
    }
}

/// What the transition function may read about the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenContext {
    pub lead: Option<LeadInfo>,
    /// Topic picked before lead info existed, consumed by the form
    pub pending_prompt: Option<String>,
}

impl ScreenContext {
    pub fn has_lead(&self) -> bool {
        self.lead.is_some()
    }
}
