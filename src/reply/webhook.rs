//! HTTP webhook implementation of the reply service

use super::types::{ReplyPayload, ReplyRequest};
use super::{ReplyError, ReplyService};
use async_trait::async_trait;
use reqwest::Client;

/// Posts each message as JSON to a single webhook URL
pub struct WebhookService {
    client: Client,
    endpoint: String,
}

impl WebhookService {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ReplyError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ReplyError::remote_unavailable(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ReplyService for WebhookService {
    async fn reply(&self, request: &ReplyRequest) -> Result<ReplyPayload, ReplyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ReplyError::remote_unavailable(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReplyError::remote_unavailable(format!("Failed to read body: {e}")))?;

        // The body is parsed whatever the status; an error page that is not
        // JSON surfaces as a malformed response.
        if !status.is_success() {
            tracing::warn!(status = %status, "Reply endpoint returned non-success status");
        }

        parse_payload(&body)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn parse_payload(body: &str) -> Result<ReplyPayload, ReplyError> {
    serde_json::from_str(body)
        .map_err(|e| ReplyError::malformed_response(format!("Invalid reply payload: {e}")))
}
