//! Conversation runtime
//!
//! A mounted widget is two tasks: the conversation actor, which owns the
//! transcript, screen, busy flag and pending queue, and the exchange worker,
//! which talks to the reply service one job at a time. Callers only ever hold
//! a [`WidgetHandle`].

mod dispatcher;
mod exchange;
mod executor;

#[cfg(test)]
pub mod testing;

pub use dispatcher::{Dispatcher, Job, PendingQueue};
pub(crate) use executor::ConversationRuntime;

use crate::config::WidgetConfig;
use crate::conversation::{ConversationStore, Message};
use crate::db::KeyValueStore;
use crate::reply::{ReplyErrorKind, ReplyService};
use crate::session::{SessionId, SessionStore};
use crate::state_machine::{Event, MenuItem, Screen, ScreenContext};
use exchange::ExchangeWorker;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Bot message appended when an exchange fails, whatever the cause
pub const FAILURE_NOTICE: &str = "Oops! Something went wrong.";

/// Events sent to observers of the widget
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    MessageAppended {
        message: Message,
    },
    Typing {
        active: bool,
        label: String,
    },
    ScreenChanged {
        screen: Screen,
    },
    /// Lead form submission blocked; the typed values are kept as a draft
    ValidationFailed {
        message: String,
    },
    /// Request not valid in the current screen
    Rejected {
        message: String,
    },
    /// Classified failure behind the generic notice in the transcript
    ExchangeFailed {
        kind: ReplyErrorKind,
        message: String,
    },
    ExchangeFinished {
        queued: usize,
    },
}

/// Lead form values kept after a failed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadDraft {
    pub name: String,
    pub email: String,
}

/// Point-in-time view of the widget
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub session_id: SessionId,
    pub screen: Screen,
    pub messages: Vec<Message>,
    /// Typing indicator label while it is shown
    pub typing: Option<String>,
    pub busy: bool,
    pub queued: usize,
    pub greeting: String,
    pub form_draft: Option<LeadDraft>,
}

#[derive(Debug)]
pub(crate) enum Command {
    Screen(Event),
    Snapshot { reply: oneshot::Sender<Snapshot> },
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Widget runtime has stopped")]
    Stopped,
}

/// Cloneable handle to a mounted widget
#[derive(Clone)]
pub struct WidgetHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    shutdown: CancellationToken,
}

impl WidgetHandle {
    /// Submit chat input. Returns once the message is accepted; the reply
    /// arrives later through [`WidgetEvent`]s.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), HandleError> {
        self.send(Event::UserMessage { text: text.into() }).await
    }

    pub async fn open(&self) -> Result<(), HandleError> {
        self.send(Event::WidgetOpened).await
    }

    pub async fn select_topic(&self, topic: impl Into<String>) -> Result<(), HandleError> {
        self.send(Event::TopicSelected {
            topic: topic.into(),
        })
        .await
    }

    pub async fn submit_lead(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<(), HandleError> {
        self.send(Event::LeadSubmitted {
            name: name.into(),
            email: email.into(),
        })
        .await
    }

    pub async fn navigate(&self, item: MenuItem) -> Result<(), HandleError> {
        self.send(Event::Navigate { item }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| HandleError::Stopped)?;
        rx.await.map_err(|_| HandleError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the actor and abandon any in-flight exchange
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the actor has exited and will touch no more state
    pub async fn stopped(&self) {
        self.command_tx.closed().await;
    }

    async fn send(&self, event: Event) -> Result<(), HandleError> {
        self.command_tx
            .send(Command::Screen(event))
            .await
            .map_err(|_| HandleError::Stopped)
    }
}

/// Load the session from `kv` and start the actor and exchange worker.
///
/// Must be called from within a Tokio runtime.
pub fn mount<R>(config: &WidgetConfig, kv: Arc<dyn KeyValueStore>, service: R) -> WidgetHandle
where
    R: ReplyService + 'static,
{
    let session = SessionStore::new(kv.clone());
    let session_id = session.get_or_create_session();
    let transcript = ConversationStore::open(session_id.clone(), kv);

    let lead = session.lead().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read lead info");
        None
    });
    let pending_prompt = session.pending_prompt().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read pending prompt");
        None
    });
    let context = ScreenContext {
        lead,
        pending_prompt,
    };

    let (command_tx, command_rx) = mpsc::channel(64);
    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let (exchange_tx, exchange_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, _) = broadcast::channel(256);
    let shutdown = CancellationToken::new();

    let worker = ExchangeWorker::new(
        Arc::new(service),
        session_id,
        config.pacing,
        config.request_timeout,
        job_rx,
        exchange_tx,
        shutdown.clone(),
    );
    tokio::spawn(worker.run());

    let runtime = ConversationRuntime::new(
        config.typing_label(),
        session,
        transcript,
        context,
        command_rx,
        exchange_rx,
        job_tx,
        broadcast_tx.clone(),
        shutdown.clone(),
    );
    tokio::spawn(runtime.run());

    WidgetHandle {
        command_tx,
        broadcast_tx,
        shutdown,
    }
}
