//! Final submission port.

use std::future::Future;

use serde::{Deserialize, Serialize};

use dossier_types::error::SubmissionError;
use dossier_types::record::ConsolidatedDraft;

/// What the endpoint said about an accepted submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub message: Option<String>,
}

impl SubmissionReceipt {
    /// Message to show the user.
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or("Application submitted successfully!")
    }
}

/// Server-side endpoint accepting the consolidated draft.
///
/// Implementations live in dossier-infra.
pub trait SubmissionEndpoint: Send + Sync {
    fn submit(
        &self,
        draft: &ConsolidatedDraft,
    ) -> impl Future<Output = Result<SubmissionReceipt, SubmissionError>> + Send;
}
