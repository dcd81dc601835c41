//! Broadcast event bus for `RunEvent`s.
//!
//! Built on `tokio::sync::broadcast`; publishing with no subscribers is a
//! no-op, and slow subscribers observe `RecvError::Lagged` rather than
//! blocking the run.

use conductor_types::event::RunEvent;
use tokio::sync::broadcast;

/// Multi-consumer bus shared by every run of one orchestrator.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn started(run_id: Uuid) -> RunEvent {
        RunEvent::RunStarted {
            run_id,
            workflow_id: "chat".to_string(),
            depth: 0,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();
        let run_id = Uuid::now_v7();

        bus.publish(started(run_id));

        assert_eq!(rx1.recv().await.unwrap().run_id(), run_id);
        assert_eq!(rx2.recv().await.unwrap().run_id(), run_id);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(started(Uuid::nil()));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
