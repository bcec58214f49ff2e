use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::models::test::{Assessment, TestStatus};
use crate::services::sync_service::{ChangeFeed, PortalEvent};

fn is_closed_marker(status: Option<&str>) -> bool {
    status.map_or(false, |s| s.trim().eq_ignore_ascii_case("closed"))
}

/// Display status of a test at `now`.
///
/// A server status of `Closed` wins over the time window. Without a start
/// the test is shown as upcoming; without an end the window never closes.
pub fn derive_status(
    now: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    server_status: Option<&str>,
) -> TestStatus {
    if is_closed_marker(server_status) {
        return TestStatus::Closed;
    }
    let Some(start) = start else {
        return TestStatus::Upcoming;
    };
    if now < start {
        return TestStatus::Upcoming;
    }
    match end {
        Some(end) if now > end => TestStatus::Completed,
        _ => TestStatus::Live,
    }
}

impl Assessment {
    /// `overall_status == "closed"` closes the test just like the server status.
    pub fn status_at(&self, now: DateTime<Utc>) -> TestStatus {
        let server = if is_closed_marker(self.overall_status.as_deref()) {
            Some("Closed")
        } else {
            self.server_status.as_deref()
        };
        derive_status(now, self.registration_start, self.end_date, server)
    }

    /// Status shown on the staff dashboard: like [`status_at`](Self::status_at)
    /// except a server `Completed` ends the test before its window does.
    pub fn dashboard_status_at(&self, now: DateTime<Utc>) -> TestStatus {
        match self.status_at(now) {
            TestStatus::Closed => TestStatus::Closed,
            _ if self
                .server_status
                .as_deref()
                .map_or(false, |s| s.trim().eq_ignore_ascii_case("completed")) =>
            {
                TestStatus::Completed
            }
            status => status,
        }
    }

    pub fn is_closed(&self) -> bool {
        is_closed_marker(self.server_status.as_deref())
            || is_closed_marker(self.overall_status.as_deref())
    }
}

/// Re-derives the status of a set of tests on an interval and publishes
/// [`PortalEvent::StatusChanged`] for every test whose status moved.
#[derive(Debug, Clone)]
pub struct StatusTicker {
    tests: Arc<RwLock<Vec<Assessment>>>,
    last_seen: Arc<RwLock<HashMap<String, TestStatus>>>,
    feed: ChangeFeed,
    interval: Duration,
}

impl StatusTicker {
    pub fn new(feed: ChangeFeed, interval: Duration) -> Self {
        Self {
            tests: Arc::new(RwLock::new(Vec::new())),
            last_seen: Arc::new(RwLock::new(HashMap::new())),
            feed,
            interval,
        }
    }

    /// Swaps the watched set. Statuses are baselined at `now` so the swap
    /// itself publishes nothing.
    pub async fn watch(&self, tests: Vec<Assessment>, now: DateTime<Utc>) {
        let baseline = tests.iter().map(|t| (t.id.clone(), t.status_at(now))).collect();
        *self.tests.write().await = tests;
        *self.last_seen.write().await = baseline;
    }

    pub async fn status_of(&self, test_id: &str) -> Option<TestStatus> {
        self.last_seen.read().await.get(test_id).copied()
    }

    /// One evaluation pass. Returns the transitions it published.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<PortalEvent> {
        let tests = self.tests.read().await;
        let mut last_seen = self.last_seen.write().await;
        let mut events = Vec::new();

        for test in tests.iter() {
            let to = test.status_at(now);
            let from = last_seen.insert(test.id.clone(), to);
            if from != Some(to) {
                events.push(PortalEvent::StatusChanged {
                    test_id: test.id.clone(),
                    from,
                    to,
                });
            }
        }
        drop(last_seen);
        drop(tests);

        for event in &events {
            debug!(?event, "test status changed");
            self.feed.publish(event.clone());
        }
        events
    }

    /// Starts ticking on the configured interval. The first evaluation runs
    /// one interval after the call.
    pub fn spawn(self) -> TickerHandle {
        let handle = tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "status ticker started");
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick_at(crate::utils::time::now()).await;
            }
        });
        TickerHandle(handle)
    }
}

/// Aborts the background task when dropped.
#[derive(Debug)]
pub struct TickerHandle(JoinHandle<()>);

impl TickerHandle {
    pub fn from_task(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
