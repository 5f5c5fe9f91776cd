//! Conversation actor

use super::dispatcher::{Dispatcher, Job};
use super::exchange::ExchangeEvent;
use super::{Command, LeadDraft, Snapshot, WidgetEvent, FAILURE_NOTICE};
use crate::conversation::{ConversationStore, Message};
use crate::session::{display_name, SessionStore};
use crate::state_machine::{
    transition, Effect, Event, Screen, ScreenContext, TransitionError,
};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Sole owner of the transcript, screen, busy flag and pending queue
pub struct ConversationRuntime {
    typing_label: String,
    session: SessionStore,
    transcript: ConversationStore,
    screen: Screen,
    context: ScreenContext,
    dispatcher: Dispatcher,
    typing: bool,
    form_draft: Option<LeadDraft>,
    command_rx: mpsc::Receiver<Command>,
    exchange_rx: mpsc::UnboundedReceiver<ExchangeEvent>,
    job_tx: mpsc::UnboundedSender<Job>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    shutdown: CancellationToken,
}

impl ConversationRuntime {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        typing_label: String,
        session: SessionStore,
        transcript: ConversationStore,
        context: ScreenContext,
        command_rx: mpsc::Receiver<Command>,
        exchange_rx: mpsc::UnboundedReceiver<ExchangeEvent>,
        job_tx: mpsc::UnboundedSender<Job>,
        broadcast_tx: broadcast::Sender<WidgetEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            typing_label,
            session,
            transcript,
            screen: Screen::default(),
            context,
            dispatcher: Dispatcher::default(),
            typing: false,
            form_draft: None,
            command_rx,
            exchange_rx,
            job_tx,
            broadcast_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let session_id = self.transcript.session_id().clone();
        tracing::info!(
            session_id = %session_id,
            messages = self.transcript.len(),
            has_lead = self.context.has_lead(),
            "Starting conversation runtime"
        );

        // Process commands and exchange progress in one loop, never concurrently
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.exchange_rx.recv() => {
                    self.handle_exchange_event(event);
                }
                () = self.shutdown.cancelled() => break,
            }
        }

        // Takes the worker down with us
        self.shutdown.cancel();
        tracing::info!(session_id = %session_id, "Conversation runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Screen(event) => self.handle_event(event),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        let attempted_lead = match &event {
            Event::LeadSubmitted { name, email } => Some(LeadDraft {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };

        let result = match transition(self.screen, &self.context, event) {
            Ok(result) => result,
            Err(e @ TransitionError::MissingLeadField { .. }) => {
                tracing::info!(error = %e, "Lead form submission rejected");
                self.form_draft = attempted_lead;
                self.broadcast(WidgetEvent::ValidationFailed {
                    message: e.to_string(),
                });
                return;
            }
            Err(e) => {
                tracing::debug!(screen = self.screen.as_str(), error = %e, "Event rejected");
                self.broadcast(WidgetEvent::Rejected {
                    message: e.to_string(),
                });
                return;
            }
        };

        if result.new_state != self.screen {
            tracing::debug!(
                from = self.screen.as_str(),
                to = result.new_state.as_str(),
                "Screen transition"
            );
        }
        self.screen = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SaveLead(lead) => {
                if let Err(e) = self.session.save_lead(&lead) {
                    tracing::warn!(error = %e, "Failed to persist lead info");
                }
                self.context.lead = Some(lead);
                self.form_draft = None;
            }
            Effect::StashPrompt { prompt } => {
                if let Err(e) = self.session.stash_prompt(&prompt) {
                    tracing::warn!(error = %e, "Failed to persist pending prompt");
                }
                self.context.pending_prompt = Some(prompt);
            }
            Effect::ClearPrompt => {
                if let Err(e) = self.session.clear_prompt() {
                    tracing::warn!(error = %e, "Failed to clear pending prompt");
                }
                self.context.pending_prompt = None;
            }
            Effect::SendUserMessage { text } => {
                // Appended now, in submission order, even if the exchange waits
                self.append(Message::user(text.clone()));
                self.dispatch(text);
            }
            Effect::SendAnnouncement { text } => self.dispatch(text),
            Effect::NotifyScreen { screen } => {
                self.broadcast(WidgetEvent::ScreenChanged { screen });
            }
        }
    }

    fn dispatch(&mut self, text: String) {
        match self.dispatcher.offer(text) {
            Some(job) => self.start(job),
            None => tracing::info!(
                queued = self.dispatcher.queued(),
                "Exchange in flight, message queued"
            ),
        }
    }

    fn start(&mut self, job: Job) {
        tracing::debug!(
            after_cooldown = job.after_cooldown,
            queued = self.dispatcher.queued(),
            "Dispatching exchange"
        );
        if self.job_tx.send(job).is_err() {
            tracing::warn!("Exchange worker is gone, message not sent");
        }
    }

    fn handle_exchange_event(&mut self, event: ExchangeEvent) {
        match event {
            ExchangeEvent::Typing { active } => self.set_typing(active),
            ExchangeEvent::Fragment { text } => self.append(Message::bot(text)),
            ExchangeEvent::Failed { error } => {
                tracing::error!(
                    session_id = %self.transcript.session_id(),
                    kind = error.kind.as_str(),
                    error = %error.message,
                    "Exchange failed"
                );
                self.set_typing(false);
                self.append(Message::bot(FAILURE_NOTICE));
                self.broadcast(WidgetEvent::ExchangeFailed {
                    kind: error.kind,
                    message: error.message,
                });
            }
            ExchangeEvent::Finished => {
                self.set_typing(false);
                if let Some(job) = self.dispatcher.finish() {
                    self.start(job);
                }
                self.broadcast(WidgetEvent::ExchangeFinished {
                    queued: self.dispatcher.queued(),
                });
            }
        }
    }

    fn set_typing(&mut self, active: bool) {
        if self.typing == active {
            return;
        }
        self.typing = active;
        self.broadcast(WidgetEvent::Typing {
            active,
            label: self.typing_label.clone(),
        });
    }

    fn append(&mut self, message: Message) {
        self.transcript.append(message.clone());
        self.broadcast(WidgetEvent::MessageAppended { message });
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            session_id: self.transcript.session_id().clone(),
            screen: self.screen,
            messages: self.transcript.messages().to_vec(),
            typing: self.typing.then(|| self.typing_label.clone()),
            busy: self.dispatcher.is_busy(),
            queued: self.dispatcher.queued(),
            greeting: format!("Hi {}", display_name(self.context.lead.as_ref())),
            form_draft: self.form_draft.clone(),
        }
    }

    fn broadcast(&self, event: WidgetEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
