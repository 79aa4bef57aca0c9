use crate::domain::SearchResult;
use crate::error::{GymIntelError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Shared outcome of one owning fetch, cloned to every joined caller
pub type SharedFetchOutcome = std::result::Result<Arc<SearchResult>, SharedFetchError>;

/// Clone-able error carried to waiters when the owning fetch fails
#[derive(Debug, Clone)]
pub struct SharedFetchError {
    pub message: String,
}

impl SharedFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Concurrency gatekeeper: at most one in-flight fetch per location key.
///
/// Exactly one caller per distinct key becomes the owner and performs the
/// actual fetch; all other concurrent callers join and resolve with the
/// same result. Entries are removed when the owning fetch reaches a
/// terminal state, or when the owner guard drops without completing, so
/// waiters never hang on a failed owner.
///
/// Explicitly injected (not an ambient singleton) so it can be unit-tested
/// and swapped for a distributed implementation. Cloning is cheap and all
/// clones share one registry.
#[derive(Clone)]
pub struct FetchCoordinator {
    in_flight: Arc<Mutex<HashMap<String, broadcast::Sender<SharedFetchOutcome>>>>,
}

/// What `acquire_or_join` handed back
pub enum FetchHandle {
    /// This caller owns the fetch for the key and must complete it
    Owner(OwnerGuard),
    /// Another caller owns the fetch; wait for its shared outcome
    Joined(broadcast::Receiver<SharedFetchOutcome>),
}

/// Ownership of an in-flight fetch for one location key.
/// Dropping the guard without completing counts as failure: the entry is
/// removed and waiters receive an abandonment error instead of hanging.
pub struct OwnerGuard {
    coordinator: FetchCoordinator,
    location_key: String,
    completed: bool,
}

impl OwnerGuard {
    pub fn location_key(&self) -> &str {
        &self.location_key
    }

    /// Publish the terminal outcome to all waiters and free the key for a
    /// future independent fetch.
    pub fn complete(mut self, outcome: SharedFetchOutcome) {
        self.completed = true;
        self.coordinator.finish(&self.location_key, outcome);
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                "Fetch owner for '{}' dropped without completing",
                self.location_key
            );
            self.coordinator.finish(
                &self.location_key,
                Err(SharedFetchError::new("owning fetch was abandoned")),
            );
        }
    }
}

impl Default for FetchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Become the owner for a key, or join the existing owner's fetch
    pub fn acquire_or_join(&self, location_key: &str) -> FetchHandle {
        let mut in_flight = self.in_flight.lock().unwrap();

        if let Some(sender) = in_flight.get(location_key) {
            debug!("Joining in-flight fetch for '{}'", location_key);
            return FetchHandle::Joined(sender.subscribe());
        }

        // Capacity 1 is enough: exactly one outcome is ever sent
        let (sender, _) = broadcast::channel(1);
        in_flight.insert(location_key.to_string(), sender);
        info!("Acquired fetch ownership for '{}'", location_key);

        FetchHandle::Owner(OwnerGuard {
            coordinator: self.clone(),
            location_key: location_key.to_string(),
            completed: false,
        })
    }

    /// Number of keys currently being fetched
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Remove the entry and broadcast the outcome to any waiters.
    /// The key is freed before waiters observe the result, so a subsequent
    /// independent search can retry immediately.
    fn finish(&self, location_key: &str, outcome: SharedFetchOutcome) {
        let sender = self.in_flight.lock().unwrap().remove(location_key);
        if let Some(sender) = sender {
            // No receivers is fine: the owner had no waiters
            let _ = sender.send(outcome);
        }
    }
}

/// Await a joined fetch with a local timeout. The timeout fails only this
/// waiter; the owning fetch (and other waiters) continue unaffected.
pub async fn wait_for_outcome(
    mut receiver: broadcast::Receiver<SharedFetchOutcome>,
    timeout: Duration,
) -> Result<Arc<SearchResult>> {
    let outcome = tokio::time::timeout(timeout, receiver.recv())
        .await
        .map_err(|_| GymIntelError::FetchTimeout(timeout.as_secs()))?;

    match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(shared_error)) => Err(GymIntelError::Api {
            message: shared_error.message,
        }),
        // Sender dropped without sending: owner abandoned the fetch
        Err(_) => Err(GymIntelError::Api {
            message: "owning fetch was abandoned".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use chrono::Utc;

    fn search_result() -> Arc<SearchResult> {
        Arc::new(SearchResult {
            location_key: "denver, colorado".to_string(),
            coordinates: Coordinates::new(39.7392, -104.9903).unwrap(),
            radius_miles: 10.0,
            timestamp: Utc::now(),
            gyms: vec![],
            total_results: 0,
            per_provider_counts: vec![],
            merged_count: 0,
            avg_confidence: 0.0,
            execution_time_seconds: 1.0,
        })
    }

    #[tokio::test]
    async fn test_first_caller_owns_second_joins() {
        let coordinator = FetchCoordinator::new();

        let first = coordinator.acquire_or_join("denver, colorado");
        assert!(matches!(first, FetchHandle::Owner(_)));

        let second = coordinator.acquire_or_join("denver, colorado");
        assert!(matches!(second, FetchHandle::Joined(_)));

        // Different key gets independent ownership
        let other = coordinator.acquire_or_join("austin, texas");
        assert!(matches!(other, FetchHandle::Owner(_)));
    }

    #[tokio::test]
    async fn test_waiters_receive_owner_result() {
        let coordinator = FetchCoordinator::new();

        let owner = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Owner(guard) => guard,
            FetchHandle::Joined(_) => panic!("expected ownership"),
        };
        let waiter = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("expected join"),
        };

        let expected = search_result();
        owner.complete(Ok(expected.clone()));

        let received = wait_for_outcome(waiter, Duration::from_secs(1)).await.unwrap();
        assert!(Arc::ptr_eq(&received, &expected));

        // Key is freed for a new independent fetch
        assert_eq!(coordinator.in_flight_count(), 0);
        assert!(matches!(
            coordinator.acquire_or_join("denver, colorado"),
            FetchHandle::Owner(_)
        ));
    }

    #[tokio::test]
    async fn test_owner_failure_propagates_without_deadlock() {
        let coordinator = FetchCoordinator::new();

        let owner = match coordinator.acquire_or_join("nowhere, zz") {
            FetchHandle::Owner(guard) => guard,
            FetchHandle::Joined(_) => panic!("expected ownership"),
        };
        let waiter = match coordinator.acquire_or_join("nowhere, zz") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("expected join"),
        };

        owner.complete(Err(SharedFetchError::new("all providers unavailable")));

        let err = wait_for_outcome(waiter, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("all providers unavailable"));
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_owner_releases_waiters() {
        let coordinator = FetchCoordinator::new();

        let owner = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Owner(guard) => guard,
            FetchHandle::Joined(_) => panic!("expected ownership"),
        };
        let waiter = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("expected join"),
        };

        drop(owner);

        let err = wait_for_outcome(waiter, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.to_string().contains("abandoned"));
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_waiter_timeout_is_local() {
        let coordinator = FetchCoordinator::new();

        let owner = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Owner(guard) => guard,
            FetchHandle::Joined(_) => panic!("expected ownership"),
        };
        let slow_waiter = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("expected join"),
        };
        let patient_waiter = match coordinator.acquire_or_join("denver, colorado") {
            FetchHandle::Joined(rx) => rx,
            FetchHandle::Owner(_) => panic!("expected join"),
        };

        // The impatient waiter times out on its own
        let err = wait_for_outcome(slow_waiter, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, GymIntelError::FetchTimeout(_)));

        // The owner is unaffected and the patient waiter still benefits
        owner.complete(Ok(search_result()));
        let result = wait_for_outcome(patient_waiter, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result.location_key, "denver, colorado");
    }
}
