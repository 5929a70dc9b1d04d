//! Cross-frame message protocol.
//!
//! The parent page (orchestrator) and every section page (agent) exchange a
//! small closed set of messages. Each message carries a `type` tag and a
//! payload; on the wire they look like
//! `{"type":"SECTION_READY","section_path":"/sections/section-parents.html"}`.
//!
//! Messages travel inside an [`Envelope`] stamped with the sender's origin
//! and frame id so receivers can decide whether to trust them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::ConsolidatedDraft;
use crate::section::SectionKey;

/// Identifier of one frame (parent page or section frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub Uuid);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Messages exchanged between the orchestrator, section agents and the
/// review agent.
///
/// Section records travel as raw JSON so that a malformed payload reaches
/// the receiver and can be discarded there instead of failing the whole
/// envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameMessage {
    /// Agent → orchestrator: local setup complete.
    SectionReady { section_path: String },

    /// Orchestrator → agent: saved state for the receiving section.
    LoadSectionData { payload: serde_json::Value },

    /// Orchestrator → agent: request the current state of one section.
    GetSectionData { section_key: SectionKey },

    /// Agent → orchestrator: reply to `GetSectionData`.
    SectionDataResponse {
        section_key: SectionKey,
        payload: serde_json::Value,
    },

    /// Agent → orchestrator: unsolicited debounced push.
    SectionDataChangedAutosave {
        section_key: SectionKey,
        payload: serde_json::Value,
    },

    /// Agent → orchestrator: show or hide a section in the navigation.
    ToggleSectionVisibility { section_key: SectionKey, show: bool },

    /// Review agent → orchestrator: request the whole draft.
    GetFullDraftData,

    /// Orchestrator → review agent: the whole draft.
    FullDraftDataResponse { payload: ConsolidatedDraft },

    /// Review agent → orchestrator: submission confirmed, drop the draft.
    ClearDraftAfterSubmit,
}

impl FrameMessage {
    /// Wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SectionReady { .. } => "SECTION_READY",
            Self::LoadSectionData { .. } => "LOAD_SECTION_DATA",
            Self::GetSectionData { .. } => "GET_SECTION_DATA",
            Self::SectionDataResponse { .. } => "SECTION_DATA_RESPONSE",
            Self::SectionDataChangedAutosave { .. } => "SECTION_DATA_CHANGED_AUTOSAVE",
            Self::ToggleSectionVisibility { .. } => "TOGGLE_SECTION_VISIBILITY",
            Self::GetFullDraftData => "GET_FULL_DRAFT_DATA",
            Self::FullDraftDataResponse { .. } => "FULL_DRAFT_DATA_RESPONSE",
            Self::ClearDraftAfterSubmit => "CLEAR_DRAFT_AFTER_SUBMIT",
        }
    }
}

/// A message in transit, stamped by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// UUIDv7 envelope ID.
    pub id: Uuid,
    /// Origin of the sending frame (scheme + host + port).
    pub origin: String,
    /// Frame that posted the message.
    pub source: FrameId,
    /// Frame the message is addressed to.
    pub target: FrameId,
    pub message: FrameMessage,
    pub sent_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(
        origin: impl Into<String>,
        source: FrameId,
        target: FrameId,
        message: FrameMessage,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            origin: origin.into(),
            source,
            target,
            message,
            sent_at: Utc::now(),
        }
    }
}
