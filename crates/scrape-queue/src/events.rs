use tokio::sync::broadcast;

use crate::QueueItem;

const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle events surfaced to observers (the pipeline's progress
/// tracker, logging, metrics). Lagging subscribers silently drop the
/// oldest events rather than block producers.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Active(QueueItem),
    Completed(QueueItem),
    Failed(QueueItem, String),
    Stalled(QueueItem),
    Error(String),
}

#[derive(Clone)]
pub struct QueueEventSender {
    inner: broadcast::Sender<QueueEvent>,
}

impl QueueEventSender {
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.subscribe()
    }

    pub fn emit(&self, event: QueueEvent) {
        // No subscribers is the common case outside tests; ignore.
        let _ = self.inner.send(event);
    }
}

pub fn sender() -> QueueEventSender {
    let (inner, _) = broadcast::channel(CHANNEL_CAPACITY);
    QueueEventSender { inner }
}
