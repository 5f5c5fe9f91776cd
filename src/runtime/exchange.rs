//! Exchange worker
//!
//! Consumes one job at a time: calls the reply service, then delivers the
//! fragments with typing pacing. Everything it observes is reported back to
//! the conversation actor as [`ExchangeEvent`]s, in order, on one channel.

use super::dispatcher::Job;
use crate::config::Pacing;
use crate::reply::{ReplyError, ReplyPayload, ReplyRequest, ReplyService};
use crate::session::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Progress of the current exchange
#[derive(Debug, Clone)]
pub(crate) enum ExchangeEvent {
    Typing { active: bool },
    Fragment { text: String },
    Failed { error: ReplyError },
    Finished,
}

pub(crate) struct ExchangeWorker<R: ReplyService + 'static> {
    service: Arc<R>,
    session_id: SessionId,
    pacing: Pacing,
    request_timeout: Option<Duration>,
    jobs: mpsc::UnboundedReceiver<Job>,
    events: mpsc::UnboundedSender<ExchangeEvent>,
    shutdown: CancellationToken,
}

impl<R: ReplyService + 'static> ExchangeWorker<R> {
    pub fn new(
        service: Arc<R>,
        session_id: SessionId,
        pacing: Pacing,
        request_timeout: Option<Duration>,
        jobs: mpsc::UnboundedReceiver<Job>,
        events: mpsc::UnboundedSender<ExchangeEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            session_id,
            pacing,
            request_timeout,
            jobs,
            events,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            let job = tokio::select! {
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                () = self.shutdown.cancelled() => break,
            };

            tokio::select! {
                () = self.process(job) => {}
                () = self.shutdown.cancelled() => break,
            }
        }
        tracing::debug!(session_id = %self.session_id, "Exchange worker stopped");
    }

    async fn process(&self, job: Job) {
        if job.after_cooldown {
            sleep(self.pacing.cooldown).await;
        }

        tracing::debug!(session_id = %self.session_id, "Starting exchange");
        self.emit(ExchangeEvent::Typing { active: true });

        let request = ReplyRequest::new(&self.session_id, job.text);
        match self.call(&request).await {
            Ok(payload) => {
                let fragments = payload.fragments();
                if fragments.is_empty() {
                    // Nothing is shown to the user in this case.
                    tracing::warn!(session_id = %self.session_id, "Reply had no fragments");
                }
                for text in fragments {
                    self.emit(ExchangeEvent::Typing { active: true });
                    sleep(self.pacing.thinking).await;
                    self.emit(ExchangeEvent::Typing { active: false });
                    self.emit(ExchangeEvent::Fragment { text });
                    sleep(self.pacing.settle).await;
                }
            }
            Err(error) => {
                self.emit(ExchangeEvent::Typing { active: false });
                self.emit(ExchangeEvent::Failed { error });
            }
        }

        self.emit(ExchangeEvent::Finished);
    }

    async fn call(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        let Some(limit) = self.request_timeout else {
            return self.service.reply(request).await;
        };
        timeout(limit, self.service.reply(request))
            .await
            .unwrap_or_else(|_| {
                Err(ReplyError::remote_unavailable(format!(
                    "No reply within {}s",
                    limit.as_secs()
                )))
            })
    }

    fn emit(&self, event: ExchangeEvent) {
        // The actor is gone only during shutdown.
        let _ = self.events.send(event);
    }
}
