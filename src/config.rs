//! Environment-driven configuration

use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5678/webhook/chat-lead-qualification-agent";
const DEFAULT_BOT_NAME: &str = "Assistant";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Fixed delays that make replies read like someone typing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Typing indicator shown before each fragment
    pub thinking: Duration,
    /// Pause after each fragment lands
    pub settle: Duration,
    /// Wait before a queued message is dispatched
    pub cooldown: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            thinking: Duration::from_millis(1000),
            settle: Duration::from_millis(200),
            cooldown: Duration::from_millis(2000),
        }
    }
}

/// Widget configuration
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub endpoint: String,
    /// SQLite file backing the session store; `None` keeps it in memory
    pub db_path: Option<String>,
    pub bot_name: String,
    pub pacing: Pacing,
    /// Bound on a single remote call; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    pub log_json: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            db_path: None,
            bot_name: DEFAULT_BOT_NAME.to_string(),
            pacing: Pacing::default(),
            request_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            log_json: false,
        }
    }
}

impl WidgetConfig {
    /// Read the full configuration. Invalid values are logged, so install
    /// the subscriber first (see [`WidgetConfig::log_json_from_env`]).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Just the log format switch, needed before logging is set up
    pub fn log_json_from_env() -> bool {
        log_json(&|name: &str| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pacing = Pacing {
            thinking: millis(&lookup, "LEAD_CHAT_THINKING_MS", defaults.pacing.thinking),
            settle: millis(&lookup, "LEAD_CHAT_SETTLE_MS", defaults.pacing.settle),
            cooldown: millis(&lookup, "LEAD_CHAT_COOLDOWN_MS", defaults.pacing.cooldown),
        };

        let timeout_secs = number(&lookup, "LEAD_CHAT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let db_path = lookup("LEAD_CHAT_DB_PATH").or_else(|| {
            lookup("HOME").map(|home| format!("{home}/.lead-chat/session.db"))
        });

        Self {
            endpoint: lookup("LEAD_CHAT_ENDPOINT").unwrap_or(defaults.endpoint),
            db_path,
            bot_name: lookup("LEAD_CHAT_BOT_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.bot_name),
            pacing,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            log_json: log_json(&lookup),
        }
    }

    /// Label shown while the bot is typing
    pub fn typing_label(&self) -> String {
        format!("{} is typing...", self.bot_name)
    }
}

fn log_json(lookup: &impl Fn(&str) -> Option<String>) -> bool {
    lookup("LEAD_CHAT_LOG_JSON").is_some_and(|v| v == "1" || v == "true")
}

fn number(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, default, "Invalid number, using default");
            default
        }),
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(number(lookup, name, default_ms))
}
