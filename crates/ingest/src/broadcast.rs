use logdock_core::ids::new_subscriber_id;
use logdock_core::model::event::LiveEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Best-effort fan-out of live events.
///
/// `publish` never waits on a subscriber. A subscriber that falls more
/// than `capacity` events behind skips the oldest ones; nothing is
/// replayed to subscribers that join later.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LiveEvent>,
}

pub struct Subscription {
    id: Uuid,
    rx: broadcast::Receiver<LiveEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription {
        let sub = Subscription {
            id: new_subscriber_id(),
            rx: self.tx.subscribe(),
        };
        debug!(subscriber = %sub.id, total = self.subscriber_count(), "subscriber joined");
        sub
    }

    pub fn unsubscribe(&self, sub: Subscription) {
        let id = sub.id;
        drop(sub);
        debug!(subscriber = %id, total = self.subscriber_count(), "subscriber left");
    }

    /// Returns how many subscribers the event was queued for.
    pub fn publish(&self, event: LiveEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                debug!("no live subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// An already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(subscriber = %self.id, skipped, "live subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Next event, or `None` once the broadcaster is gone.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscriber = %self.id, skipped, "live subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use logdock_core::model::log::LogLevel;

    use super::*;

    fn event(total: usize) -> LiveEvent {
        let mut record = testkit::record(LogLevel::Info, "hello", "r", testkit::base_ts());
        record.id = "fixed".to_string();
        record.ingested_at = testkit::base_ts();
        LiveEvent::LogIngested {
            record,
            total_count: total,
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let b = Broadcaster::new(8);
        assert_eq!(b.publish(event(1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_event() {
        let b = Broadcaster::new(8);
        let mut s1 = b.subscribe();
        let mut s2 = b.subscribe();
        assert_eq!(b.publish(event(3)), 2);
        assert_eq!(s1.recv().await, Some(event(3)));
        assert_eq!(s2.recv().await, Some(event(3)));
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_backlog() {
        let b = Broadcaster::new(8);
        let _early = b.subscribe();
        b.publish(event(1));
        let mut late = b.subscribe();
        b.publish(event(2));
        assert_eq!(late.recv().await, Some(event(2)));
    }

    #[tokio::test]
    async fn unsubscribe_updates_count() {
        let b = Broadcaster::new(8);
        let s = b.subscribe();
        assert_eq!(b.subscriber_count(), 1);
        b.unsubscribe(s);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let b = Broadcaster::new(2);
        let mut slow = b.subscribe();
        for i in 0..5 {
            b.publish(event(i));
        }
        assert_eq!(slow.recv().await, Some(event(3)));
        assert_eq!(slow.recv().await, Some(event(4)));
    }
}
