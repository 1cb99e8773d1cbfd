use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::ListenEvent;

/// In-process fan-out for listen events, backed by `tokio::broadcast`.
/// The live subscriber publishes here; the page store and any debug
/// consumers subscribe independently.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ListenEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event to all current subscribers. Returns the number of
    /// receivers the event reached; an error means nobody is listening.
    pub fn publish(
        &self,
        event: ListenEvent,
    ) -> Result<usize, broadcast::error::SendError<ListenEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ListenEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
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
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ListenEvent::Welcome).unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ListenEvent::Welcome));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ListenEvent::Reconnect).unwrap();

        assert!(matches!(rx1.recv().await.unwrap(), ListenEvent::Reconnect));
        assert!(matches!(rx2.recv().await.unwrap(), ListenEvent::Reconnect));
    }
}
