//! In-process [`EventBus`] over `tokio::sync::broadcast` (spec.md §4.6).

use oak_ci_domain::ports::{DomainEvent, EventBus};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

pub struct BroadcastEventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: DomainEvent) {
        // No subscribers is a normal state (e.g. no open status SSE stream);
        // `send` erroring just means the event is dropped.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}
