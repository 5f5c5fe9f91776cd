//! Events that can occur in the widget

use super::state::MenuItem;

/// Events that trigger screen transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Widget became visible
    WidgetOpened,
    /// Help topic or quick action picked on the intro screen
    TopicSelected { topic: String },
    /// Lead form submitted
    LeadSubmitted { name: String, email: String },
    /// Footer menu navigation
    Navigate { item: MenuItem },
    /// Text typed into the chat input
    UserMessage { text: String },
}
