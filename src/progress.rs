use crate::domain::{SearchProgress, SearchStatus};
use crate::error::{GymIntelError, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Rough estimate used for the estimated-completion field: seconds of
/// remaining work per missing progress percent.
const SECONDS_PER_PERCENT: f64 = 0.3;

struct SearchChannel {
    sender: broadcast::Sender<SearchProgress>,
    latest: SearchProgress,
    /// Once set, further publishes for this search are ignored
    muted: bool,
}

/// Publishes ordered progress events for in-flight searches to any number
/// of subscribers.
///
/// Each search gets a bounded broadcast channel: a slow subscriber lags and
/// loses the oldest events rather than blocking the publisher. Late
/// subscribers receive at least the most recent status. Terminal entries
/// stick around for a grace period so a subscriber arriving just after
/// completion still sees the final state.
pub struct ProgressPublisher {
    searches: Arc<Mutex<HashMap<Uuid, SearchChannel>>>,
    buffer_size: usize,
    retention: Duration,
}

impl ProgressPublisher {
    pub fn new(buffer_size: usize, retention_seconds: u64) -> Self {
        Self {
            searches: Arc::new(Mutex::new(HashMap::new())),
            buffer_size,
            retention: Duration::from_secs(retention_seconds),
        }
    }

    /// Register a new search and return its id
    pub fn create_search(&self, location: &str) -> Uuid {
        let search_id = Uuid::new_v4();
        let initial = SearchProgress {
            search_id,
            status: SearchStatus::Queued,
            progress_percentage: 0.0,
            current_step: "Initializing search".to_string(),
            estimated_completion: Some(Utc::now() + ChronoDuration::seconds(30)),
            message: None,
        };

        let (sender, _) = broadcast::channel(self.buffer_size.max(1));
        self.searches.lock().unwrap().insert(
            search_id,
            SearchChannel {
                sender,
                latest: initial,
                muted: false,
            },
        );

        info!("Created search {} for location: {}", search_id, location);
        search_id
    }

    /// Publish a progress update. Percentage never decreases within one
    /// search; a terminal status is published at most once.
    pub fn publish(
        &self,
        search_id: Uuid,
        status: SearchStatus,
        progress: f64,
        current_step: &str,
        message: Option<String>,
    ) {
        let mut searches = self.searches.lock().unwrap();
        let channel = match searches.get_mut(&search_id) {
            Some(channel) => channel,
            None => {
                warn!("Search {} not found", search_id);
                return;
            }
        };
        if channel.muted {
            debug!("Search {} already terminal; dropping {:?} event", search_id, status);
            return;
        }

        // Monotonic percentage within one search
        let progress = progress
            .clamp(0.0, 100.0)
            .max(channel.latest.progress_percentage);

        let estimated_completion = if status.is_terminal() {
            None
        } else {
            let remaining = (100.0 - progress) * SECONDS_PER_PERCENT;
            Some(Utc::now() + ChronoDuration::seconds(remaining as i64))
        };

        let event = SearchProgress {
            search_id,
            status,
            progress_percentage: progress,
            current_step: current_step.to_string(),
            estimated_completion,
            message,
        };

        channel.latest = event.clone();
        // Send fails only when no subscriber exists, which is fine
        let _ = channel.sender.send(event);

        if status.is_terminal() {
            channel.muted = true;
            self.schedule_cleanup(search_id);
        }
    }

    /// Subscribe to a search. Returns the latest snapshot (delivered first)
    /// and a receiver for subsequent events.
    pub fn subscribe(
        &self,
        search_id: Uuid,
    ) -> Result<(SearchProgress, broadcast::Receiver<SearchProgress>)> {
        let searches = self.searches.lock().unwrap();
        let channel = searches
            .get(&search_id)
            .ok_or(GymIntelError::SearchNotFound(search_id))?;
        Ok((channel.latest.clone(), channel.sender.subscribe()))
    }

    /// Current status snapshot of a search
    pub fn get_search_status(&self, search_id: Uuid) -> Option<SearchProgress> {
        self.searches
            .lock()
            .unwrap()
            .get(&search_id)
            .map(|c| c.latest.clone())
    }

    /// Whether the search has been muted (terminal event already published)
    pub fn is_terminal(&self, search_id: Uuid) -> bool {
        self.searches
            .lock()
            .unwrap()
            .get(&search_id)
            .map(|c| c.muted)
            .unwrap_or(true)
    }

    /// Drop search state after the retention window
    fn schedule_cleanup(&self, search_id: Uuid) {
        let searches = Arc::clone(&self.searches);
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            searches.lock().unwrap().remove(&search_id);
            info!("Cleaned up search {}", search_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> Arc<ProgressPublisher> {
        Arc::new(ProgressPublisher::new(32, 300))
    }

    #[tokio::test]
    async fn test_events_are_ordered_and_monotone() {
        let publisher = publisher();
        let id = publisher.create_search("austin, texas");
        let (snapshot, mut rx) = publisher.subscribe(id).unwrap();
        assert_eq!(snapshot.status, SearchStatus::Queued);

        publisher.publish(id, SearchStatus::ResolvingLocation, 10.0, "resolving", None);
        publisher.publish(id, SearchStatus::Fetching, 50.0, "fetching", None);
        // Out-of-order percentage must be clamped up, not regress
        publisher.publish(id, SearchStatus::Reconciling, 40.0, "reconciling", None);
        publisher.publish(id, SearchStatus::Complete, 100.0, "done", None);

        let mut last_pct = snapshot.progress_percentage;
        let mut saw_terminal = false;
        while let Ok(event) = rx.recv().await {
            assert!(event.progress_percentage >= last_pct);
            last_pct = event.progress_percentage;
            if event.status.is_terminal() {
                saw_terminal = true;
                break;
            }
        }
        assert!(saw_terminal);
        assert_eq!(last_pct, 100.0);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest_state() {
        let publisher = publisher();
        let id = publisher.create_search("denver, colorado");

        publisher.publish(id, SearchStatus::Fetching, 60.0, "fetching", None);

        // Subscriber joins after events already fired
        let (snapshot, _rx) = publisher.subscribe(id).unwrap();
        assert_eq!(snapshot.status, SearchStatus::Fetching);
        assert_eq!(snapshot.progress_percentage, 60.0);
    }

    #[tokio::test]
    async fn test_no_events_after_terminal() {
        let publisher = publisher();
        let id = publisher.create_search("austin, texas");
        publisher.publish(id, SearchStatus::Failed, 10.0, "failed", Some("boom".into()));
        publisher.publish(id, SearchStatus::Fetching, 50.0, "fetching", None);

        let snapshot = publisher.get_search_status(id).unwrap();
        assert_eq!(snapshot.status, SearchStatus::Failed);
        assert!(publisher.is_terminal(id));
    }

    #[tokio::test]
    async fn test_unknown_search_subscribe_fails() {
        let publisher = publisher();
        let err = publisher.subscribe(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, GymIntelError::SearchNotFound(_)));
    }
}
