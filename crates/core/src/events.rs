use crate::models::CategorizationResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
pub struct CategorizationEvent {
    pub document_id: String,
    pub categories: Vec<CategorizationResult>,
    pub categorized_at: DateTime<Utc>,
}

impl CategorizationEvent {
    pub fn new(document_id: &str, categories: Vec<CategorizationResult>) -> Self {
        Self {
            document_id: document_id.to_string(),
            categories,
            categorized_at: Utc::now(),
        }
    }
}

/// Fire-and-forget outbound notifications. Slow subscribers lag and lose the
/// oldest events; the engine never waits on them.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CategorizationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CategorizationEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: CategorizationEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_ignored() {
        let bus = EventBus::default();
        assert_eq!(
            bus.publish(CategorizationEvent::new("d", vec![])),
            0
        );
        let mut rx = bus.subscribe();
        assert_eq!(
            bus.publish(CategorizationEvent::new("e", vec![])),
            1
        );
        assert_eq!(rx.recv().await.unwrap().document_id, "e");
    }
}
