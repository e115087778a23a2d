use tokio::sync::broadcast;

use crate::model::StoreEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast feed of store mutations. The catalog cache subscribes to it
/// so writes that bypass [`crate::catalog::Catalog`] still invalidate.
pub struct ChangeFeed {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn send(&self, event: &StoreEvent) {
        let _ = self.sender.send(event.clone());
    }
}
