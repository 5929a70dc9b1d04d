//! Review agent: fetches the whole draft, renders it for confirmation and
//! hands it to the submission endpoint.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dossier_types::error::SubmissionError;
use dossier_types::protocol::{Envelope, FrameId, FrameMessage};
use dossier_types::record::{ConsolidatedDraft, FieldValue, RecordEntry};
use dossier_types::section::{SectionEntry, SectionKey};

use crate::frame::FramePort;
use crate::submission::{SubmissionEndpoint, SubmissionReceipt};

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Friendlier labels for fields whose names read poorly.
const FIELD_LABELS: &[(&str, &str)] = &[
    ("applicant_name", "Full Name (as per passport)"),
    ("applicant_race_religion", "Race & Religion"),
    ("spouse_name", "Spouse's Name"),
    ("ns_applicable", "National Service Applicable"),
    ("ns_organization", "NS Organization"),
];

/// `snake_case` → `Title Case`, unless a friendlier label is known.
pub fn field_label(name: &str) -> String {
    if let Some((_, label)) = FIELD_LABELS.iter().find(|(field, _)| *field == name) {
        return label.to_string();
    }
    title_case(name)
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display form of a field value.
pub fn format_value(value: &FieldValue) -> String {
    let text = match value {
        FieldValue::Flag(true) => return "Yes".to_string(),
        FieldValue::Flag(false) => return "No".to_string(),
        FieldValue::List(items) => items.join(", "),
        FieldValue::Text(text) => text.clone(),
    };
    if text.trim().is_empty() {
        "N/A".to_string()
    } else {
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    /// e.g. `Sibling 2`.
    pub heading: String,
    pub lines: Vec<ReviewLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewGroup {
    pub name: String,
    /// Empty when the group has no entries.
    pub items: Vec<ReviewItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSection {
    pub key: SectionKey,
    pub title: String,
    pub lines: Vec<ReviewLine>,
    pub groups: Vec<ReviewGroup>,
}

/// Read-only rendering of a consolidated draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewDocument {
    pub sections: Vec<ReviewSection>,
}

impl ReviewDocument {
    /// Render `draft` with sections in `order`; sections the order does not
    /// mention follow, titled from their keys.
    pub fn render(draft: &ConsolidatedDraft, order: &[SectionEntry]) -> Self {
        let mut sections = Vec::new();
        for entry in order {
            if let Some(record) = draft.section(&entry.key) {
                sections.push(render_section(entry.key.clone(), entry.title.clone(), record));
            }
        }
        for (key, record) in draft.iter() {
            if !order.iter().any(|e| &e.key == key) {
                sections.push(render_section(key.clone(), title_case(key.as_str()), record));
            }
        }
        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn render_section(
    key: SectionKey,
    title: String,
    record: &dossier_types::record::SectionRecord,
) -> ReviewSection {
    let mut lines = Vec::new();
    let mut groups = Vec::new();
    for (name, entry) in record.entries() {
        match entry {
            RecordEntry::Value(value) => lines.push(ReviewLine {
                label: field_label(name),
                value: format_value(value),
            }),
            RecordEntry::Group(items) => {
                let group_title = title_case(name);
                groups.push(ReviewGroup {
                    name: name.to_string(),
                    items: items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| ReviewItem {
                            heading: format!("{group_title} {}", i + 1),
                            lines: item
                                .iter()
                                .map(|(field, value)| ReviewLine {
                                    label: field_label(field),
                                    value: format_value(value),
                                })
                                .collect(),
                        })
                        .collect(),
                });
            }
        }
    }
    ReviewSection {
        key,
        title,
        lines,
        groups,
    }
}

impl fmt::Display for ReviewDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "== {} ==", section.title)?;
            for line in &section.lines {
                writeln!(f, "{}: {}", line.label, line.value)?;
            }
            for group in &section.groups {
                if group.items.is_empty() {
                    writeln!(f, "No entries for this section.")?;
                }
                for item in &group.items {
                    writeln!(f, "-- {} --", item.heading)?;
                    for line in &item.lines {
                        writeln!(f, "{}: {}", line.label, line.value)?;
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Loading,
    /// Draft received; submission possible once the declaration is confirmed.
    Ready,
    /// The draft came back empty.
    Empty,
    Submitted,
    /// Last submission failed; retry allowed.
    Failed(String),
}

pub struct ReviewAgent<P, S> {
    port: P,
    endpoint: S,
    parent: FrameId,
    parent_origin: String,
    order: Vec<SectionEntry>,
    draft: Option<ConsolidatedDraft>,
    declaration_confirmed: bool,
    state: ReviewState,
}

impl<P: FramePort, S: SubmissionEndpoint> ReviewAgent<P, S> {
    pub fn new(
        port: P,
        endpoint: S,
        parent: FrameId,
        parent_origin: impl Into<String>,
        order: Vec<SectionEntry>,
    ) -> Self {
        Self {
            port,
            endpoint,
            parent,
            parent_origin: parent_origin.into(),
            order,
            draft: None,
            declaration_confirmed: false,
            state: ReviewState::Loading,
        }
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn draft(&self) -> Option<&ConsolidatedDraft> {
        self.draft.as_ref()
    }

    /// Ask the orchestrator for the whole draft.
    pub fn request(&self) -> Result<(), dossier_types::error::ChannelError> {
        self.port.post(self.parent, FrameMessage::GetFullDraftData)
    }

    /// Handle one incoming envelope. Returns `true` once a draft was taken.
    pub fn handle(&mut self, envelope: &Envelope) -> bool {
        if envelope.origin != self.parent_origin || envelope.source != self.parent {
            warn!(origin = %envelope.origin, kind = envelope.message.kind(), "review: dropping untrusted message");
            return false;
        }
        match &envelope.message {
            FrameMessage::FullDraftDataResponse { payload } => {
                self.state = if payload.is_empty() {
                    ReviewState::Empty
                } else {
                    ReviewState::Ready
                };
                info!(sections = payload.len(), "review: received draft");
                self.draft = Some(payload.clone());
                true
            }
            other => {
                debug!(kind = other.kind(), "review: ignoring message");
                false
            }
        }
    }

    /// Request the draft and wait for it, up to `timeout`.
    pub async fn fetch(
        &mut self,
        mailbox: &mut mpsc::Receiver<Envelope>,
        timeout: Duration,
    ) -> Result<Option<&ConsolidatedDraft>, dossier_types::error::ChannelError> {
        self.request()?;
        let wait = async {
            while let Some(envelope) = mailbox.recv().await {
                if self.handle(&envelope) {
                    return;
                }
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!(?timeout, "review: no draft received");
        }
        Ok(self.draft.as_ref())
    }

    /// Rendered draft, once received.
    pub fn render(&self) -> Option<ReviewDocument> {
        self.draft
            .as_ref()
            .map(|draft| ReviewDocument::render(draft, &self.order))
    }

    pub fn confirm_declaration(&mut self, confirmed: bool) {
        self.declaration_confirmed = confirmed;
    }

    /// Whether the submit control should be enabled.
    pub fn can_submit(&self) -> bool {
        self.declaration_confirmed
            && self.draft.as_ref().is_some_and(|d| !d.is_empty())
            && self.state != ReviewState::Submitted
    }

    /// Submit the draft. On success the orchestrator is told to drop its
    /// saved copy; on failure everything is kept for a retry.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, SubmissionError> {
        if self.state == ReviewState::Submitted {
            warn!("review: submission already accepted");
            return Err(SubmissionError::AlreadySubmitted);
        }
        if !self.declaration_confirmed {
            return Err(SubmissionError::DeclarationUnconfirmed);
        }
        let draft = match &self.draft {
            Some(draft) if !draft.is_empty() => draft,
            _ => return Err(SubmissionError::NoData),
        };

        match self.endpoint.submit(draft).await {
            Ok(receipt) => {
                info!(sections = draft.len(), "review: submission accepted");
                self.state = ReviewState::Submitted;
                if let Err(err) = self.port.post(self.parent, FrameMessage::ClearDraftAfterSubmit) {
                    warn!(error = %err, "review: could not ask for draft removal");
                }
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, "review: submission failed");
                self.state = ReviewState::Failed(err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use dossier_types::config::default_sections;
    use dossier_types::record::{FieldRecord, SectionRecord};

    use crate::frame::{BusPort, FrameBus};

    const ORIGIN: &str = "http://localhost:8888";

    #[derive(Clone, Default)]
    struct FakeEndpoint {
        fail_with: Arc<Mutex<Option<(u16, String)>>>,
        received: Arc<Mutex<Vec<ConsolidatedDraft>>>,
    }

    impl SubmissionEndpoint for FakeEndpoint {
        async fn submit(&self, draft: &ConsolidatedDraft) -> Result<SubmissionReceipt, SubmissionError> {
            self.received.lock().unwrap().push(draft.clone());
            match self.fail_with.lock().unwrap().clone() {
                Some((status, message)) => Err(SubmissionError::Rejected { status, message }),
                None => Ok(SubmissionReceipt {
                    message: Some("Received".to_string()),
                }),
            }
        }
    }

    fn key(k: &str) -> SectionKey {
        SectionKey::new(k).unwrap()
    }

    fn sample_draft() -> ConsolidatedDraft {
        let mut applicant = SectionRecord::new();
        applicant.set_field("applicant_name", FieldValue::text("Jane Tan"));
        applicant.set_field("has_pets", FieldValue::Flag(false));
        applicant.set_field("languages", FieldValue::List(vec!["en".into(), "ms".into()]));
        applicant.set_field("nickname", FieldValue::text(""));

        let mut siblings = SectionRecord::new();
        let mut first = FieldRecord::new();
        first.insert("full_name".to_string(), FieldValue::text("A"));
        siblings.set_group("sibling", vec![first, FieldRecord::new()]);

        let mut draft = ConsolidatedDraft::new();
        draft.replace_section(key("siblings"), siblings);
        draft.replace_section(key("applicant_details"), applicant);
        draft
    }

    struct Harness {
        bus: Arc<FrameBus>,
        parent: FrameId,
        parent_rx: mpsc::Receiver<Envelope>,
        review: FrameId,
        review_rx: mpsc::Receiver<Envelope>,
    }

    fn harness() -> Harness {
        let bus = Arc::new(FrameBus::new());
        let parent = FrameId::new();
        let review = FrameId::new();
        let parent_rx = bus.register(parent, ORIGIN);
        let review_rx = bus.register(review, ORIGIN);
        Harness {
            bus,
            parent,
            parent_rx,
            review,
            review_rx,
        }
    }

    fn agent(h: &Harness, endpoint: FakeEndpoint) -> ReviewAgent<BusPort, FakeEndpoint> {
        ReviewAgent::new(
            BusPort::new(h.bus.clone(), h.review),
            endpoint,
            h.parent,
            ORIGIN,
            default_sections(),
        )
    }

    #[test]
    fn test_formatting() {
        assert_eq!(field_label("date_of_birth"), "Date Of Birth");
        assert_eq!(field_label("applicant_name"), "Full Name (as per passport)");
        assert_eq!(format_value(&FieldValue::Flag(true)), "Yes");
        assert_eq!(format_value(&FieldValue::Flag(false)), "No");
        assert_eq!(format_value(&FieldValue::List(vec!["a".into(), "b".into()])), "a, b");
        assert_eq!(format_value(&FieldValue::List(vec![])), "N/A");
        assert_eq!(format_value(&FieldValue::text("  ")), "N/A");
    }

    #[test]
    fn test_render_orders_sections_and_numbers_items() {
        let doc = ReviewDocument::render(&sample_draft(), &default_sections());
        let titles: Vec<&str> = doc.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Applicant Details", "Sibling's Information"]);

        let siblings = &doc.sections[1].groups[0];
        assert_eq!(siblings.items[0].heading, "Sibling 1");
        assert_eq!(siblings.items[1].heading, "Sibling 2");
        assert_eq!(siblings.items[0].lines[0].label, "Full Name");

        let text = doc.to_string();
        assert!(text.contains("Languages: en, ms"));
        assert!(text.contains("Nickname: N/A"));
        assert!(text.contains("Has Pets: No"));
    }

    #[tokio::test]
    async fn test_fetch_waits_for_trusted_response() {
        let mut h = harness();
        let mut review = agent(&h, FakeEndpoint::default());

        h.bus
            .post(
                h.parent,
                h.review,
                FrameMessage::FullDraftDataResponse {
                    payload: sample_draft(),
                },
            )
            .unwrap();
        let draft = review
            .fetch(&mut h.review_rx, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(draft, Some(&sample_draft()));
        assert_eq!(review.state(), &ReviewState::Ready);
        assert_eq!(h.parent_rx.recv().await.unwrap().message, FrameMessage::GetFullDraftData);
    }

    #[tokio::test]
    async fn test_fetch_times_out_without_answer() {
        let mut h = harness();
        let mut review = agent(&h, FakeEndpoint::default());
        let draft = review
            .fetch(&mut h.review_rx, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(draft.is_none());
        assert_eq!(review.state(), &ReviewState::Loading);
    }

    #[tokio::test]
    async fn test_submit_requires_declaration_and_data() {
        let h = harness();
        let mut review = agent(&h, FakeEndpoint::default());
        review.confirm_declaration(true);
        assert!(matches!(review.submit().await, Err(SubmissionError::NoData)));

        review.handle(&Envelope::new(
            ORIGIN,
            h.parent,
            h.review,
            FrameMessage::FullDraftDataResponse {
                payload: sample_draft(),
            },
        ));
        review.confirm_declaration(false);
        assert!(!review.can_submit());
        assert!(matches!(
            review.submit().await,
            Err(SubmissionError::DeclarationUnconfirmed)
        ));
    }

    #[tokio::test]
    async fn test_failed_submission_allows_retry_then_clears() {
        let mut h = harness();
        let endpoint = FakeEndpoint::default();
        *endpoint.fail_with.lock().unwrap() = Some((500, "database unavailable".to_string()));
        let mut review = agent(&h, endpoint.clone());
        review.handle(&Envelope::new(
            ORIGIN,
            h.parent,
            h.review,
            FrameMessage::FullDraftDataResponse {
                payload: sample_draft(),
            },
        ));
        review.confirm_declaration(true);

        let err = review.submit().await.unwrap_err();
        assert!(err.to_string().contains("database unavailable"));
        assert!(matches!(review.state(), ReviewState::Failed(_)));
        assert!(h.parent_rx.try_recv().is_err());
        assert!(review.can_submit());

        *endpoint.fail_with.lock().unwrap() = None;
        let receipt = review.submit().await.unwrap();
        assert_eq!(receipt.display_message(), "Received");
        assert_eq!(review.state(), &ReviewState::Submitted);
        assert_eq!(
            h.parent_rx.recv().await.unwrap().message,
            FrameMessage::ClearDraftAfterSubmit
        );
        assert_eq!(endpoint.received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_submit_is_refused() {
        let mut h = harness();
        let endpoint = FakeEndpoint::default();
        let mut review = agent(&h, endpoint.clone());
        review.handle(&Envelope::new(
            ORIGIN,
            h.parent,
            h.review,
            FrameMessage::FullDraftDataResponse {
                payload: sample_draft(),
            },
        ));
        review.confirm_declaration(true);

        review.submit().await.unwrap();
        assert!(!review.can_submit());
        assert!(matches!(
            review.submit().await,
            Err(SubmissionError::AlreadySubmitted)
        ));
        assert_eq!(endpoint.received.lock().unwrap().len(), 1);
        assert_eq!(review.state(), &ReviewState::Submitted);
        assert_eq!(
            h.parent_rx.recv().await.unwrap().message,
            FrameMessage::ClearDraftAfterSubmit
        );
        assert!(h.parent_rx.try_recv().is_err(), "draft removal asked for once");
    }

    #[test]
    fn test_untrusted_draft_is_ignored() {
        let h = harness();
        let mut review = agent(&h, FakeEndpoint::default());
        let taken = review.handle(&Envelope::new(
            "https://evil.example",
            h.parent,
            h.review,
            FrameMessage::FullDraftDataResponse {
                payload: sample_draft(),
            },
        ));
        assert!(!taken);
        assert!(review.draft().is_none());
    }
}
