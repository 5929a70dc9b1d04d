//! HTTP submission client.
//!
//! Posts the consolidated draft as JSON to the configured endpoint. Both the
//! success and the error body may carry a `message`; anything else in them is
//! ignored.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use dossier_core::submission::{SubmissionEndpoint, SubmissionReceipt};
use dossier_types::error::SubmissionError;
use dossier_types::record::ConsolidatedDraft;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// [`SubmissionEndpoint`] over HTTP.
pub struct HttpSubmissionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpSubmissionClient {
    pub fn new(url: impl Into<String>) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SubmissionError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SubmissionEndpoint for HttpSubmissionClient {
    async fn submit(&self, draft: &ConsolidatedDraft) -> Result<SubmissionReceipt, SubmissionError> {
        debug!(url = %self.url, sections = draft.len(), "submitting draft");
        let response = self
            .client
            .post(&self.url)
            .json(draft)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            // A success without a JSON body still counts.
            return Ok(serde_json::from_str(&body).unwrap_or_default());
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
        warn!(status = status.as_u16(), %message, "submission rejected");
        Err(SubmissionError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
