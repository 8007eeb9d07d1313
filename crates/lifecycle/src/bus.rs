use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel for lifecycle events. Publishing never blocks.
#[derive(Clone)]
pub struct EventBus<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + std::fmt::Debug> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers that will see the event
    pub fn publish(&self, event: T) -> usize {
        trace!("Publishing {:?}", event);
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + std::fmt::Debug> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoconf_domain::LifecycleEvent;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus: EventBus<LifecycleEvent> = EventBus::default();
        assert_eq!(bus.publish(LifecycleEvent::UnitCreated), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(LifecycleEvent::UnitCreated);
        bus.publish(LifecycleEvent::UnitCompleted { failed: true });

        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::UnitCreated);
        assert_eq!(rx.recv().await.unwrap(), LifecycleEvent::UnitCompleted { failed: true });
    }
}
