//! Reply-generation service abstraction
//!
//! The remote backend is opaque: one JSON request per exchange, one JSON
//! payload back whose `reply` text carries delimiter-separated fragments.

mod error;
mod types;
mod webhook;

pub use error::{ReplyError, ReplyErrorKind};
pub use types::{split_fragments, ReplyPayload, ReplyRequest, FRAGMENT_DELIMITER};
pub use webhook::WebhookService;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for reply backends
#[async_trait]
pub trait ReplyService: Send + Sync {
    /// Send one message and wait for the full payload
    async fn reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError>;

    /// Where requests go, for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: ReplyService + ?Sized> ReplyService for Arc<T> {
    async fn reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        (**self).reply(request).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for reply services
pub struct LoggingService {
    inner: Arc<dyn ReplyService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn ReplyService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ReplyService for LoggingService {
    async fn reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        let start = std::time::Instant::now();
        let result = self.inner.reply(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(payload) => {
                tracing::info!(
                    endpoint = %self.inner.endpoint(),
                    chat_id = %request.chat_id,
                    duration_ms = %duration.as_millis(),
                    fragments = payload.fragments().len(),
                    "Reply request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.inner.endpoint(),
                    chat_id = %request.chat_id,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    "Reply request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }
}
