//! The parent-page orchestrator.
//!
//! Owns the user's identity, the in-memory consolidated draft and the draft
//! store. Section frames push their records here; every accepted record
//! replaces the section's entry (last write wins) and the whole draft is
//! written back. A failed write keeps the in-memory draft marked dirty and
//! the next accepted message or navigation writes it again.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dossier_types::config::DossierConfig;
use dossier_types::error::ChannelError;
use dossier_types::identity::UserIdentity;
use dossier_types::protocol::{Envelope, FrameId, FrameMessage};
use dossier_types::record::{ConsolidatedDraft, SectionRecord};
use dossier_types::section::{SectionEntry, SectionKey};

use super::status::{StatusBus, StatusEvent};
use crate::draft::{BlobStore, DraftStore};
use crate::frame::FramePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Manual,
    Auto,
}

#[derive(Debug, Clone)]
struct PendingSave {
    section: SectionKey,
    deadline: Instant,
}

/// One navigation entry as the shell should render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub entry: SectionEntry,
    pub active: bool,
    pub visible: bool,
}

/// Commands from the page shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate(SectionKey),
    Save,
}

pub struct Orchestrator<B, P> {
    config: DossierConfig,
    store: DraftStore<B>,
    port: P,
    identity: UserIdentity,
    draft: ConsolidatedDraft,
    dirty: bool,
    active: Option<SectionKey>,
    section_frame: Option<FrameId>,
    pending_save: Option<PendingSave>,
    hidden: BTreeSet<SectionKey>,
    status: StatusBus,
}

impl<B: BlobStore, P: FramePort> Orchestrator<B, P> {
    /// Load the user's draft and make the first configured section active.
    ///
    /// A store that cannot be read yields an empty draft.
    pub async fn load(
        config: DossierConfig,
        store: DraftStore<B>,
        port: P,
        identity: UserIdentity,
        status: StatusBus,
    ) -> Self {
        let mut draft = match store.load(&identity).await {
            Ok(draft) => draft,
            Err(err) => {
                error!(identity = %identity, error = %err, "failed to read draft, starting empty");
                ConsolidatedDraft::new()
            }
        };

        let unknown: Vec<SectionKey> = draft
            .keys()
            .filter(|k| !config.is_known_section(k))
            .cloned()
            .collect();
        for key in unknown {
            warn!(section = %key, "discarding saved data for unknown section");
            draft.remove_section(&key);
        }

        let active = config.sections.first().map(|e| e.key.clone());
        info!(identity = %identity, sections = draft.len(), "orchestrator ready");

        Self {
            config,
            store,
            port,
            identity,
            draft,
            dirty: false,
            active,
            section_frame: None,
            pending_save: None,
            hidden: BTreeSet::new(),
            status,
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn draft(&self) -> &ConsolidatedDraft {
        &self.draft
    }

    pub fn active(&self) -> Option<&SectionKey> {
        self.active.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn status(&self) -> &StatusBus {
        &self.status
    }

    pub fn is_section_visible(&self, key: &SectionKey) -> bool {
        !self.hidden.contains(key)
    }

    /// Navigation entries in configured order.
    pub fn navigation(&self) -> Vec<NavEntry> {
        self.config
            .sections
            .iter()
            .map(|entry| NavEntry {
                active: self.active.as_ref() == Some(&entry.key),
                visible: self.is_section_visible(&entry.key),
                entry: entry.clone(),
            })
            .collect()
    }

    /// Switch the section frame to another section.
    ///
    /// Returns the resource path the frame should load, or `None` for an
    /// unknown section. Does not collect the current section; a draft left
    /// dirty by an earlier failed write is written again.
    pub async fn navigate(&mut self, key: &SectionKey) -> Option<String> {
        let Some(entry) = self.config.section(key) else {
            warn!(section = %key, "navigation to unknown section");
            return None;
        };
        let path = entry.resource_path();

        self.active = Some(key.clone());
        self.section_frame = None;
        if let Some(pending) = self.pending_save.take() {
            debug!(section = %pending.section, "abandoning pending save on navigation");
        }
        if self.dirty {
            self.flush().await;
        }

        info!(section = %key, %path, "navigated");
        self.status.publish(StatusEvent::SectionActivated {
            section: key.clone(),
            path: path.clone(),
        });
        Some(path)
    }

    /// Ask the active section for its data. The draft is written when the
    /// answer arrives; without one the save turns stuck at the deadline.
    pub fn request_save(&mut self, now: Instant) -> Result<bool, ChannelError> {
        let (Some(section), Some(frame)) = (self.active.clone(), self.section_frame) else {
            warn!("save requested but no section is ready");
            self.status.publish(StatusEvent::SaveFailed {
                reason: "no section is ready to save".to_string(),
            });
            return Ok(false);
        };
        self.port.post(
            frame,
            FrameMessage::GetSectionData {
                section_key: section.clone(),
            },
        )?;
        debug!(section = %section, "requested section data");
        self.pending_save = Some(PendingSave {
            section,
            deadline: now + self.config.save_timeout(),
        });
        Ok(true)
    }

    /// When the pending explicit save turns stuck, if one is pending.
    pub fn save_deadline(&self) -> Option<Instant> {
        self.pending_save.as_ref().map(|p| p.deadline)
    }

    /// Surface a stuck save if its deadline passed. Returns whether it did.
    pub fn check_timeouts(&mut self, now: Instant) -> bool {
        match &self.pending_save {
            Some(pending) if pending.deadline <= now => {
                warn!(section = %pending.section, "save request went unanswered");
                self.status.publish(StatusEvent::SaveStuck {
                    section: pending.section.clone(),
                });
                self.pending_save = None;
                true
            }
            _ => false,
        }
    }

    /// Handle one incoming envelope.
    ///
    /// Envelopes from an unexpected origin are dropped without touching any
    /// state.
    pub async fn handle(&mut self, envelope: Envelope) {
        if envelope.origin != self.config.expected_origin {
            warn!(
                origin = %envelope.origin,
                kind = envelope.message.kind(),
                "dropping message from unexpected origin"
            );
            return;
        }

        let saved = match envelope.message {
            FrameMessage::SectionReady { section_path } => {
                self.on_ready(envelope.source, &section_path);
                false
            }
            FrameMessage::SectionDataChangedAutosave {
                section_key,
                payload,
            } => self.accept(section_key, payload, SaveKind::Auto).await,
            FrameMessage::SectionDataResponse {
                section_key,
                payload,
            } => {
                let answered = self
                    .pending_save
                    .as_ref()
                    .is_some_and(|p| p.section == section_key);
                if answered {
                    self.pending_save = None;
                }
                let written = self.accept(section_key.clone(), payload, SaveKind::Manual).await;
                if answered && !written {
                    self.status.publish(StatusEvent::SaveFailed {
                        reason: format!("section '{section_key}' returned unusable data"),
                    });
                }
                written
            }
            FrameMessage::ToggleSectionVisibility { section_key, show } => {
                self.on_toggle(section_key, show);
                false
            }
            FrameMessage::GetFullDraftData => {
                self.reply(
                    envelope.source,
                    FrameMessage::FullDraftDataResponse {
                        payload: self.draft.clone(),
                    },
                );
                false
            }
            FrameMessage::ClearDraftAfterSubmit => {
                self.clear().await;
                true
            }
            other => {
                debug!(kind = other.kind(), "ignoring message not meant for the orchestrator");
                false
            }
        };

        if !saved && self.dirty {
            self.flush().await;
        }
    }

    fn on_ready(&mut self, source: FrameId, section_path: &str) {
        let Some(key) = SectionKey::from_path(section_path) else {
            warn!(path = %section_path, "ready message from a non-section path");
            return;
        };
        if !self.config.is_known_section(&key) {
            warn!(section = %key, "ready message from an unknown section");
            return;
        }
        if self.active.as_ref().is_some_and(|active| active != &key) {
            warn!(section = %key, "ready message from a section that is not active");
            return;
        }
        self.section_frame = Some(source);

        match self.draft.section(&key) {
            Some(record) => {
                let payload = record.to_json();
                self.reply(source, FrameMessage::LoadSectionData { payload });
                debug!(section = %key, "pushed saved data to section");
            }
            None => debug!(section = %key, "no saved data for section"),
        }
    }

    fn on_toggle(&mut self, key: SectionKey, show: bool) {
        let changed = if show {
            self.hidden.remove(&key)
        } else {
            self.hidden.insert(key.clone())
        };
        if changed {
            debug!(section = %key, show, "section visibility changed");
        }
        self.status.publish(StatusEvent::SectionVisibility { section: key, show });
    }

    /// Merge a pushed record and write the draft. Returns whether a write
    /// was attempted.
    async fn accept(&mut self, key: SectionKey, payload: serde_json::Value, kind: SaveKind) -> bool {
        if !self.config.is_known_section(&key) {
            warn!(section = %key, "discarding data for unknown section");
            return false;
        }
        let record = match SectionRecord::from_json(payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(section = %key, error = %err, "discarding malformed section data");
                return false;
            }
        };

        self.draft.replace_section(key.clone(), record);
        self.dirty = true;
        if self.flush().await {
            self.status.publish(match kind {
                SaveKind::Manual => StatusEvent::Saved { section: key },
                SaveKind::Auto => StatusEvent::AutoSaved { section: key },
            });
        }
        true
    }

    /// Write the whole draft. Returns whether the write succeeded.
    async fn flush(&mut self) -> bool {
        match self.store.save(&self.identity, &self.draft).await {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(err) => {
                error!(identity = %self.identity, error = %err, "failed to save draft");
                self.status.publish(StatusEvent::SaveFailed {
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    async fn clear(&mut self) {
        match self.store.clear(&self.identity).await {
            Ok(()) => {
                self.draft.clear();
                self.dirty = false;
                info!(identity = %self.identity, "draft cleared after submission");
                self.status.publish(StatusEvent::DraftCleared);
            }
            Err(err) => {
                error!(identity = %self.identity, error = %err, "failed to clear draft");
                self.status.publish(StatusEvent::SaveFailed {
                    reason: err.to_string(),
                });
            }
        }
    }

    fn reply(&self, target: FrameId, message: FrameMessage) {
        let kind = message.kind();
        if let Err(err) = self.port.post(target, message) {
            warn!(%target, kind, error = %err, "failed to reply to frame");
        }
    }

    /// Drive the orchestrator until cancelled or both channels close.
    pub async fn run(
        mut self,
        mut mailbox: mpsc::Receiver<Envelope>,
        mut commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let mut mailbox_open = true;
        let mut commands_open = true;
        while mailbox_open || commands_open {
            let deadline = self.save_deadline();
            tokio::select! {
                _ = cancel.cancelled() => break,
                envelope = mailbox.recv(), if mailbox_open => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => mailbox_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Navigate(key)) => {
                        self.navigate(&key).await;
                    }
                    Some(Command::Save) => {
                        if let Err(err) = self.request_save(Instant::now()) {
                            warn!(error = %err, "could not request section data");
                            self.status.publish(StatusEvent::SaveFailed { reason: err.to_string() });
                        }
                    }
                    None => commands_open = false,
                },
                _ = sleep_until_some(deadline), if deadline.is_some() => {
                    self.check_timeouts(Instant::now());
                }
            }
        }
        debug!("orchestrator stopped");
        self
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
