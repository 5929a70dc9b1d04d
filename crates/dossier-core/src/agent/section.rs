//! Section agent: the protocol side of one section frame.
//!
//! Owns the frame's `SectionPage`. Announces readiness once, answers data
//! requests for its own key, applies pushed data, and pushes a debounced
//! autosave after trusted user input.
//!
//! Time is passed in explicitly (`now`) so the debounce can be driven by
//! the run loop or stepped deterministically.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dossier_types::error::ChannelError;
use dossier_types::protocol::{Envelope, FrameId, FrameMessage};
use dossier_types::record::SectionRecord;

use crate::document::NodeId;
use crate::form::{Click, SectionPage};
use crate::frame::FramePort;

/// A trusted user input event, addressed by field name or element id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageInput {
    SetValue { name: String, value: String },
    SetChecked { name: String, value: Option<String>, checked: bool },
    Click { id: String },
}

pub struct SectionAgent<P> {
    page: SectionPage,
    port: P,
    parent: FrameId,
    parent_origin: String,
    debounce: Duration,
    autosave_due: Option<Instant>,
    announced: bool,
}

impl<P: FramePort> SectionAgent<P> {
    pub fn new(
        page: SectionPage,
        port: P,
        parent: FrameId,
        parent_origin: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            page,
            port,
            parent,
            parent_origin: parent_origin.into(),
            debounce,
            autosave_due: None,
            announced: false,
        }
    }

    pub fn page(&self) -> &SectionPage {
        &self.page
    }

    /// Post `SECTION_READY` (first call only) followed by any pending
    /// section visibility requests. Returns whether the announcement was
    /// sent by this call.
    pub fn announce(&mut self) -> Result<bool, ChannelError> {
        if self.announced {
            return Ok(false);
        }
        self.port.post(
            self.parent,
            FrameMessage::SectionReady {
                section_path: self.page.path().to_string(),
            },
        )?;
        self.announced = true;
        info!(section = %self.page.key(), "announced section ready");
        self.flush_section_toggles()?;
        Ok(true)
    }

    /// Handle one incoming envelope. Envelopes not from the parent frame at
    /// the expected origin are dropped.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        if envelope.origin != self.parent_origin || envelope.source != self.parent {
            warn!(
                section = %self.page.key(),
                origin = %envelope.origin,
                kind = envelope.message.kind(),
                "dropping message from untrusted sender"
            );
            return Ok(());
        }

        match &envelope.message {
            FrameMessage::GetSectionData { section_key } if section_key == self.page.key() => {
                let payload = self.page.collect().to_json();
                self.port.post(
                    self.parent,
                    FrameMessage::SectionDataResponse {
                        section_key: section_key.clone(),
                        payload,
                    },
                )?;
                debug!(section = %section_key, "answered data request");
            }
            FrameMessage::GetSectionData { section_key } => {
                debug!(section = %self.page.key(), requested = %section_key, "data request for another section");
            }
            FrameMessage::LoadSectionData { payload } => {
                self.load(payload.clone());
                self.flush_section_toggles()?;
            }
            other => {
                debug!(section = %self.page.key(), kind = other.kind(), "ignoring message");
            }
        }
        Ok(())
    }

    fn load(&mut self, payload: serde_json::Value) {
        match SectionRecord::from_json(payload) {
            Ok(record) if record.is_empty() => {
                debug!(section = %self.page.key(), "empty payload, nothing to load");
            }
            Ok(record) => {
                let assigned = self.page.populate(&record);
                info!(section = %self.page.key(), fields = assigned, "loaded section data");
            }
            Err(err) => {
                warn!(section = %self.page.key(), error = %err, "malformed section payload ignored");
            }
        }
    }

    /// Apply a trusted input event and (re)start the autosave debounce.
    ///
    /// Returns `false` if the event does not address anything on the page.
    pub fn input(&mut self, event: &PageInput, now: Instant) -> Result<bool, ChannelError> {
        let applied = match event {
            PageInput::SetValue { name, value } => self
                .page
                .field_by_name(name)
                .is_some_and(|node| self.page.set_value(node, value.clone())),
            PageInput::SetChecked {
                name,
                value,
                checked,
            } => self
                .find_choice(name, value.as_deref())
                .is_some_and(|node| self.page.set_checked(node, *checked)),
            PageInput::Click { id } => match self.page.document().get_by_id(id) {
                Some(node) => !matches!(self.page.click(node), Click::Ignored),
                None => false,
            },
        };

        if !applied {
            debug!(section = %self.page.key(), ?event, "input does not match the page");
            return Ok(false);
        }
        self.autosave_due = Some(now + self.debounce);
        self.flush_section_toggles()?;
        Ok(true)
    }

    fn find_choice(&self, name: &str, value: Option<&str>) -> Option<NodeId> {
        let doc = self.page.document();
        doc.fields(doc.root()).into_iter().find(|&id| {
            doc.field(id)
                .is_some_and(|f| f.name == name && value.is_none_or(|v| f.value == v))
        })
    }

    /// When the pending autosave is due, if any.
    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave_due
    }

    /// Push the autosave if its debounce has elapsed. Returns whether it was
    /// sent.
    pub fn poll_autosave(&mut self, now: Instant) -> Result<bool, ChannelError> {
        match self.autosave_due {
            Some(due) if due <= now => {
                self.autosave_due = None;
                let key = self.page.key().clone();
                self.port.post(
                    self.parent,
                    FrameMessage::SectionDataChangedAutosave {
                        section_key: key.clone(),
                        payload: self.page.collect().to_json(),
                    },
                )?;
                debug!(section = %key, "pushed autosave");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn flush_section_toggles(&mut self) -> Result<(), ChannelError> {
        for toggle in self.page.take_section_toggles() {
            self.port.post(
                self.parent,
                FrameMessage::ToggleSectionVisibility {
                    section_key: toggle.key,
                    show: toggle.show,
                },
            )?;
        }
        Ok(())
    }

    /// Drive the agent until cancelled or both channels close.
    ///
    /// Transport failures are logged and never stop the loop.
    pub async fn run(
        mut self,
        mut mailbox: mpsc::Receiver<Envelope>,
        mut inputs: mpsc::Receiver<PageInput>,
        cancel: CancellationToken,
    ) -> SectionPage {
        if let Err(err) = self.announce() {
            warn!(section = %self.page.key(), error = %err, "failed to announce readiness");
        }

        let mut mailbox_open = true;
        let mut inputs_open = true;
        while mailbox_open || inputs_open {
            let deadline = self.autosave_due;
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                envelope = mailbox.recv(), if mailbox_open => match envelope {
                    Some(envelope) => self.handle(&envelope),
                    None => {
                        mailbox_open = false;
                        Ok(())
                    }
                },
                event = inputs.recv(), if inputs_open => match event {
                    Some(event) => self.input(&event, Instant::now()).map(|_| ()),
                    None => {
                        inputs_open = false;
                        Ok(())
                    }
                },
                _ = sleep_until_some(deadline), if deadline.is_some() => {
                    self.poll_autosave(Instant::now()).map(|_| ())
                }
            };
            if let Err(err) = result {
                warn!(section = %self.page.key(), error = %err, "section agent transport error");
            }
        }

        debug!(section = %self.page.key(), "section agent stopped");
        self.page
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
