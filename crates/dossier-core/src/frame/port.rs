//! Sending side of the cross-frame transport, as seen by one frame.

use std::sync::Arc;

use dossier_types::error::ChannelError;
use dossier_types::protocol::{FrameId, FrameMessage};

use super::bus::FrameBus;

/// Lets a frame post messages to other frames.
pub trait FramePort: Send + Sync {
    /// The frame this port posts from.
    fn frame(&self) -> FrameId;

    fn post(&self, target: FrameId, message: FrameMessage) -> Result<(), ChannelError>;
}

/// `FramePort` over a shared [`FrameBus`].
#[derive(Debug, Clone)]
pub struct BusPort {
    bus: Arc<FrameBus>,
    frame: FrameId,
}

impl BusPort {
    pub fn new(bus: Arc<FrameBus>, frame: FrameId) -> Self {
        Self { bus, frame }
    }
}

impl FramePort for BusPort {
    fn frame(&self) -> FrameId {
        self.frame
    }

    fn post(&self, target: FrameId, message: FrameMessage) -> Result<(), ChannelError> {
        self.bus.post(self.frame, target, message).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_port_posts_from_its_frame() {
        let bus = Arc::new(FrameBus::new());
        let me = FrameId::new();
        let peer = FrameId::new();
        let _me_rx = bus.register(me, "http://localhost:8888");
        let mut peer_rx = bus.register(peer, "http://localhost:8888");

        let port = BusPort::new(bus.clone(), me);
        assert_eq!(port.frame(), me);
        port.post(peer, FrameMessage::GetFullDraftData).unwrap();
        assert_eq!(peer_rx.recv().await.unwrap().source, me);
    }
}
