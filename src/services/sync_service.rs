use tokio::sync::broadcast;
use tracing::debug;

use crate::models::profile::Role;
use crate::models::test::TestStatus;

const DEFAULT_CAPACITY: usize = 256;

/// Something another view may need to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalEvent {
    /// A store key was written or removed.
    StoreChanged { key: String },
    StoreCleared,
    StatusChanged {
        test_id: String,
        from: Option<TestStatus>,
        to: TestStatus,
    },
    ProfileUpdated { role: Role },
    /// A test was created, edited, closed, published or deleted.
    TestsChanged { test_id: Option<String> },
    SessionExpired,
}

/// Fan-out of [`PortalEvent`]s to every subscriber.
///
/// Subscribers that fall more than the channel capacity behind lose the
/// oldest events and see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<PortalEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortalEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: PortalEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "no subscribers for portal event");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let feed = ChangeFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();

        assert_eq!(feed.publish(PortalEvent::SessionExpired), 2);
        assert_eq!(a.recv().await.unwrap(), PortalEvent::SessionExpired);
        assert_eq!(b.recv().await.unwrap(), PortalEvent::SessionExpired);
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.publish(PortalEvent::StoreCleared), 0);
    }
}
