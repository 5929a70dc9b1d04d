//! In-memory cross-frame transport.
//!
//! Every frame (the parent page, each section frame, the review page) gets a
//! bounded `mpsc` mailbox. Posting stamps the envelope with the origin the
//! *sender* was registered under, so a receiver can trust `envelope.origin`
//! the same way a browser lets a page trust `MessageEvent.origin`.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use dossier_types::error::ChannelError;
use dossier_types::protocol::{Envelope, FrameId, FrameMessage};

/// Buffer size for per-frame mailboxes.
const MAILBOX_BUFFER: usize = 256;

struct Mailbox {
    origin: String,
    sender: mpsc::Sender<Envelope>,
}

/// Hub connecting every frame of one page session.
pub struct FrameBus {
    frames: DashMap<FrameId, Mailbox>,
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBus {
    pub fn new() -> Self {
        Self {
            frames: DashMap::new(),
        }
    }

    /// Register a frame loaded from `origin` and return its mailbox.
    ///
    /// Registering an existing frame replaces its mailbox, as a reload does.
    pub fn register(&self, frame: FrameId, origin: impl Into<String>) -> mpsc::Receiver<Envelope> {
        let (sender, receiver) = mpsc::channel(MAILBOX_BUFFER);
        let origin = origin.into();
        debug!(%frame, %origin, "registered frame");
        self.frames.insert(frame, Mailbox { origin, sender });
        receiver
    }

    /// Drop a frame's mailbox. Returns `true` if it was registered.
    pub fn unregister(&self, frame: &FrameId) -> bool {
        let removed = self.frames.remove(frame).is_some();
        if removed {
            debug!(%frame, "unregistered frame");
        }
        removed
    }

    pub fn is_registered(&self, frame: &FrameId) -> bool {
        self.frames.contains_key(frame)
    }

    /// Origin a frame was registered under.
    pub fn origin_of(&self, frame: &FrameId) -> Option<String> {
        self.frames.get(frame).map(|m| m.origin.clone())
    }

    /// Post a message from `source` to `target` (fire-and-forget).
    ///
    /// Returns the envelope id. Fails if either frame is unknown or the
    /// target's mailbox is full or closed.
    pub fn post(
        &self,
        source: FrameId,
        target: FrameId,
        message: FrameMessage,
    ) -> Result<Uuid, ChannelError> {
        let origin = self
            .origin_of(&source)
            .ok_or(ChannelError::NotRegistered(source))?;
        let mailbox = self
            .frames
            .get(&target)
            .ok_or(ChannelError::NotRegistered(target))?;

        let kind = message.kind();
        let envelope = Envelope::new(origin, source, target, message);
        let id = envelope.id;
        mailbox.sender.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::MailboxFull(target),
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed(target),
        })?;

        debug!(%source, %target, kind, "posted frame message");
        Ok(id)
    }
}

impl std::fmt::Debug for FrameBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBus")
            .field("frames", &self.frames.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_types::section::SectionKey;

    const ORIGIN: &str = "http://localhost:8888";

    #[tokio::test]
    async fn test_post_stamps_sender_origin() {
        let bus = FrameBus::new();
        let parent = FrameId::new();
        let frame = FrameId::new();
        let mut parent_rx = bus.register(parent, ORIGIN);
        let _frame_rx = bus.register(frame, "https://elsewhere.example");

        bus.post(
            frame,
            parent,
            FrameMessage::SectionReady {
                section_path: "/sections/section-parents.html".to_string(),
            },
        )
        .unwrap();

        let envelope = parent_rx.recv().await.unwrap();
        assert_eq!(envelope.origin, "https://elsewhere.example");
        assert_eq!(envelope.source, frame);
        assert_eq!(envelope.target, parent);
    }

    #[test]
    fn test_unregistered_frames_are_errors() {
        let bus = FrameBus::new();
        let known = FrameId::new();
        let unknown = FrameId::new();
        let _rx = bus.register(known, ORIGIN);

        let err = bus.post(unknown, known, FrameMessage::GetFullDraftData).unwrap_err();
        assert!(matches!(err, ChannelError::NotRegistered(id) if id == unknown));
        let err = bus.post(known, unknown, FrameMessage::GetFullDraftData).unwrap_err();
        assert!(matches!(err, ChannelError::NotRegistered(id) if id == unknown));
    }

    #[test]
    fn test_closed_mailbox() {
        let bus = FrameBus::new();
        let a = FrameId::new();
        let b = FrameId::new();
        let _a_rx = bus.register(a, ORIGIN);
        drop(bus.register(b, ORIGIN));
        let err = bus
            .post(
                a,
                b,
                FrameMessage::GetSectionData {
                    section_key: SectionKey::new("parents").unwrap(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, ChannelError::Closed(_)));
    }

    #[test]
    fn test_full_mailbox() {
        let bus = FrameBus::new();
        let a = FrameId::new();
        let b = FrameId::new();
        let _a_rx = bus.register(a, ORIGIN);
        let _b_rx = bus.register(b, ORIGIN);
        for _ in 0..MAILBOX_BUFFER {
            bus.post(a, b, FrameMessage::GetFullDraftData).unwrap();
        }
        let err = bus.post(a, b, FrameMessage::GetFullDraftData).unwrap_err();
        assert!(matches!(err, ChannelError::MailboxFull(_)));
    }

    #[test]
    fn test_reregister_replaces_mailbox() {
        let bus = FrameBus::new();
        let a = FrameId::new();
        let _first = bus.register(a, ORIGIN);
        let _second = bus.register(a, "http://other");
        assert_eq!(bus.origin_of(&a).as_deref(), Some("http://other"));
        assert!(bus.unregister(&a));
        assert!(!bus.is_registered(&a));
    }
}
