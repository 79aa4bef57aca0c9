use crate::config::SearchConfig;
use crate::coordinator::{wait_for_outcome, FetchCoordinator, FetchHandle, SharedFetchError};
use crate::domain::{ResolvedLocation, SearchResult, SearchStatus};
use crate::error::{GymIntelError, Result};
use crate::freshness::FreshnessStore;
use crate::geocoding::LocationResolver;
use crate::metrics::{ReconcileMetrics, SearchMetrics};
use crate::progress::ProgressPublisher;
use crate::providers::MultiSourceFetcher;
use crate::reconcile::Reconciler;
use crate::storage::Storage;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Caller-supplied result filters, applied after reconciliation so the
/// shared fetch outcome stays unfiltered for other waiters.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub min_confidence: Option<f64>,
    pub min_rating: Option<f64>,
    /// Keep only entities backed by this provider
    pub source: Option<String>,
    /// Keep only entities with / without a known website
    pub has_website: Option<bool>,
    /// Keep only entities with / without a known Instagram handle
    pub has_instagram: Option<bool>,
    pub max_results: Option<usize>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.min_confidence.is_none()
            && self.min_rating.is_none()
            && self.source.is_none()
            && self.has_website.is_none()
            && self.has_instagram.is_none()
            && self.max_results.is_none()
    }
}

/// Orchestrates the full search pipeline: resolve, freshness check,
/// coordinated fetch, reconcile, persist, publish progress.
///
/// Two entry points share the same core: `search_gyms` runs inline and
/// returns the result, `trigger_search` runs the pipeline in a background
/// task and streams progress through the publisher. Cloning is cheap and
/// all clones share state.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    resolver: LocationResolver,
    fetcher: MultiSourceFetcher,
    reconciler: Reconciler,
    storage: Arc<dyn Storage>,
    freshness: FreshnessStore,
    coordinator: FetchCoordinator,
    progress: Arc<ProgressPublisher>,
    config: SearchConfig,
    running: Mutex<HashMap<Uuid, AbortHandle>>,
}

impl SearchService {
    pub fn new(
        resolver: LocationResolver,
        fetcher: MultiSourceFetcher,
        reconciler: Reconciler,
        storage: Arc<dyn Storage>,
        coordinator: FetchCoordinator,
        progress: Arc<ProgressPublisher>,
        config: SearchConfig,
    ) -> Self {
        let freshness = FreshnessStore::new(Arc::clone(&storage));
        Self {
            inner: Arc::new(ServiceInner {
                resolver,
                fetcher,
                reconciler,
                storage,
                freshness,
                coordinator,
                progress,
                config,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    pub fn progress(&self) -> &Arc<ProgressPublisher> {
        &self.inner.progress
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    /// Resolve a location without running a search
    pub async fn resolve_location(&self, location: &str) -> Result<ResolvedLocation> {
        self.inner.resolver.resolve(location).await
    }

    /// Inline search: resolve, serve fresh persisted data when available,
    /// otherwise fetch (or join an in-flight fetch), then filter.
    pub async fn search_gyms(
        &self,
        location: &str,
        radius_miles: Option<f64>,
        filters: &SearchFilters,
        force_refresh: bool,
    ) -> Result<SearchResult> {
        SearchMetrics::record_search_started();
        let radius = radius_miles.unwrap_or(self.inner.config.default_radius_miles);
        let started = std::time::Instant::now();

        let result = self
            .resolve_and_fetch(location, radius, force_refresh, None)
            .await;

        match result {
            Ok(result) => {
                SearchMetrics::record_search_completed(
                    started.elapsed().as_secs_f64(),
                    result.total_results,
                );
                Ok(apply_filters(&result, filters))
            }
            Err(e) => {
                SearchMetrics::record_search_failed();
                Err(e)
            }
        }
    }

    /// Start a background search and return its id immediately.
    /// Progress events stream through the publisher under this id.
    pub fn trigger_search(
        &self,
        location: String,
        radius_miles: Option<f64>,
        force_refresh: bool,
    ) -> Uuid {
        let search_id = self.inner.progress.create_search(&location);
        SearchMetrics::record_search_started();

        let service = self.clone();
        let radius = radius_miles.unwrap_or(self.inner.config.default_radius_miles);
        let (registered_tx, registered_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            // Hold the pipeline until its abort handle is registered, so a
            // search that finishes instantly still finds its own entry to
            // remove and can never be "cancelled" after completion
            let _ = registered_rx.await;
            service
                .run_pipeline(search_id, location, radius, force_refresh)
                .await;
        });

        self.inner
            .running
            .lock()
            .unwrap()
            .insert(search_id, handle.abort_handle());
        let _ = registered_tx.send(());
        search_id
    }

    /// Cancel a running background search. The search's own pipeline task
    /// is aborted, but an owned in-flight fetch keeps running so other
    /// searches waiting on the same location key still get their result.
    pub fn cancel_search(&self, search_id: Uuid) -> bool {
        let handle = self.inner.running.lock().unwrap().remove(&search_id);
        match handle {
            Some(handle) => {
                handle.abort();
                self.inner.progress.publish(
                    search_id,
                    SearchStatus::Failed,
                    0.0,
                    "Cancelled",
                    Some("Search cancelled by request".to_string()),
                );
                SearchMetrics::record_search_failed();
                info!("Cancelled search {}", search_id);
                true
            }
            None => false,
        }
    }

    async fn run_pipeline(
        &self,
        search_id: Uuid,
        location: String,
        radius_miles: f64,
        force_refresh: bool,
    ) {
        let started = std::time::Instant::now();
        let timeout = Duration::from_secs(self.inner.config.search_timeout_seconds);

        let outcome = tokio::time::timeout(
            timeout,
            self.resolve_and_fetch(&location, radius_miles, force_refresh, Some(search_id)),
        )
        .await
        .unwrap_or(Err(GymIntelError::FetchTimeout(timeout.as_secs())));

        match outcome {
            Ok(result) => {
                SearchMetrics::record_search_completed(
                    started.elapsed().as_secs_f64(),
                    result.total_results,
                );
                self.inner.progress.publish(
                    search_id,
                    SearchStatus::Complete,
                    100.0,
                    "Search complete",
                    Some(format!(
                        "Found {} gyms ({} merged from multiple sources)",
                        result.total_results, result.merged_count
                    )),
                );
            }
            Err(e) => {
                SearchMetrics::record_search_failed();
                error!("Search {} failed: {}", search_id, e);
                self.inner.progress.publish(
                    search_id,
                    SearchStatus::Failed,
                    0.0,
                    "Search failed",
                    Some(e.to_string()),
                );
            }
        }

        self.inner.running.lock().unwrap().remove(&search_id);
    }

    /// Shared pipeline core for both entry points. `search_id` is present
    /// only on the background path and routes progress events.
    async fn resolve_and_fetch(
        &self,
        location: &str,
        radius_miles: f64,
        force_refresh: bool,
        search_id: Option<Uuid>,
    ) -> Result<SearchResult> {
        self.report(search_id, SearchStatus::ResolvingLocation, 10.0, "Resolving location");
        let resolved = self.inner.resolver.resolve(location).await?;

        if !force_refresh {
            let report = self
                .inner
                .freshness
                .check_freshness(
                    &resolved.location_key,
                    &resolved.coordinates,
                    radius_miles,
                    self.inner.config.freshness_max_age_seconds,
                )
                .await?;
            if let Some(cached) = report.cached_result {
                SearchMetrics::record_cache_hit();
                info!(
                    "Serving '{}' from persisted data ({} gyms, {}s old)",
                    resolved.location_key,
                    cached.total_results,
                    report.age_seconds.unwrap_or(0)
                );
                self.report(search_id, SearchStatus::Persisting, 90.0, "Serving cached results");
                return Ok(cached);
            }
        }

        self.report(search_id, SearchStatus::Fetching, 25.0, "Contacting data providers");
        let result = self.fetch_or_join(&resolved, radius_miles, search_id).await?;
        Ok(result.as_ref().clone())
    }

    /// At most one concurrent fetch per location key: become the owner or
    /// wait on whoever already owns it.
    async fn fetch_or_join(
        &self,
        resolved: &ResolvedLocation,
        radius_miles: f64,
        search_id: Option<Uuid>,
    ) -> Result<Arc<SearchResult>> {
        let receiver = match self.inner.coordinator.acquire_or_join(&resolved.location_key) {
            FetchHandle::Owner(guard) => {
                SearchMetrics::record_fetch_owned();
                // Subscribe to our own fetch before spawning it, then run
                // the fetch detached: cancelling this search must not kill
                // a fetch other searches are waiting on.
                let receiver = match self.inner.coordinator.acquire_or_join(&resolved.location_key)
                {
                    FetchHandle::Joined(rx) => rx,
                    FetchHandle::Owner(_) => unreachable!("entry registered by guard above"),
                };

                let service = self.clone();
                let resolved = resolved.clone();
                tokio::spawn(async move {
                    let outcome = service
                        .perform_fetch(&resolved, radius_miles, search_id)
                        .await;
                    match outcome {
                        Ok(result) => guard.complete(Ok(Arc::new(result))),
                        Err(e) => {
                            warn!("Fetch for '{}' failed: {}", resolved.location_key, e);
                            guard.complete(Err(SharedFetchError::new(e.to_string())));
                        }
                    }
                });
                receiver
            }
            FetchHandle::Joined(receiver) => {
                SearchMetrics::record_fetch_joined();
                self.report(
                    search_id,
                    SearchStatus::Fetching,
                    40.0,
                    "Waiting on an in-flight fetch for this location",
                );
                receiver
            }
        };

        wait_for_outcome(
            receiver,
            Duration::from_secs(self.inner.config.waiter_timeout_seconds),
        )
        .await
    }

    /// The owning fetch: query all providers, reconcile, persist, and
    /// assemble the result surface.
    async fn perform_fetch(
        &self,
        resolved: &ResolvedLocation,
        radius_miles: f64,
        search_id: Option<Uuid>,
    ) -> Result<SearchResult> {
        let started = std::time::Instant::now();

        let progress = Arc::clone(&self.inner.progress);
        let per_provider = self
            .inner
            .fetcher
            .fetch_all(&resolved.coordinates, radius_miles, |name, settled, total| {
                if let Some(id) = search_id {
                    // Provider settles spread across the 40-70 band
                    let pct = 40.0 + 30.0 * settled as f64 / total as f64;
                    progress.publish(
                        id,
                        SearchStatus::Fetching,
                        pct,
                        &format!("Received results from {}", name),
                        None,
                    );
                }
            })
            .await?;

        self.report(search_id, SearchStatus::Reconciling, 80.0, "Reconciling listings");
        let listings = per_provider.successful_listings();
        let entities = self
            .inner
            .reconciler
            .reconcile(&listings, &resolved.location_key);
        let merged = entities.iter().filter(|e| e.sources.len() > 1).count();
        ReconcileMetrics::record_reconciled(listings.len(), entities.len(), merged);

        self.report(search_id, SearchStatus::Persisting, 90.0, "Persisting results");
        let report = self.inner.storage.upsert_entities(&entities).await?;
        info!(
            "Persisted search for '{}': {} created, {} updated",
            resolved.location_key, report.created, report.updated
        );

        // Read back the canonical set so the result reflects merges with
        // previously persisted entities, not just this fetch
        let gyms = self
            .inner
            .storage
            .get_gyms_by_location_key(&resolved.location_key)
            .await?;

        let merged_count = gyms.iter().filter(|g| g.sources.len() > 1).count();
        let avg_confidence = if gyms.is_empty() {
            0.0
        } else {
            gyms.iter().map(|g| g.confidence).sum::<f64>() / gyms.len() as f64
        };
        let total_results = gyms.len();

        Ok(SearchResult {
            location_key: resolved.location_key.clone(),
            coordinates: resolved.coordinates,
            radius_miles,
            timestamp: Utc::now(),
            gyms,
            total_results,
            per_provider_counts: per_provider.provider_counts(),
            merged_count,
            avg_confidence,
            execution_time_seconds: started.elapsed().as_secs_f64(),
        })
    }

    fn report(&self, search_id: Option<Uuid>, status: SearchStatus, pct: f64, step: &str) {
        if let Some(id) = search_id {
            self.inner.progress.publish(id, status, pct, step, None);
        }
    }
}

/// Filter and rank a result for one caller. The input is left untouched.
pub fn apply_filters(result: &SearchResult, filters: &SearchFilters) -> SearchResult {
    if filters.is_empty() {
        return result.clone();
    }

    let mut gyms: Vec<_> = result
        .gyms
        .iter()
        .filter(|g| filters.min_confidence.map_or(true, |min| g.confidence >= min))
        .filter(|g| {
            filters
                .min_rating
                .map_or(true, |min| g.rating.map_or(false, |r| r >= min))
        })
        .filter(|g| {
            filters
                .source
                .as_deref()
                .map_or(true, |source| g.has_source(source))
        })
        .filter(|g| {
            filters
                .has_website
                .map_or(true, |wanted| g.website.is_some() == wanted)
        })
        .filter(|g| {
            filters
                .has_instagram
                .map_or(true, |wanted| g.instagram.is_some() == wanted)
        })
        .cloned()
        .collect();

    gyms.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(max) = filters.max_results {
        gyms.truncate(max);
    }

    let merged_count = gyms.iter().filter(|g| g.sources.len() > 1).count();
    let avg_confidence = if gyms.is_empty() {
        0.0
    } else {
        gyms.iter().map(|g| g.confidence).sum::<f64>() / gyms.len() as f64
    };
    let total_results = gyms.len();

    SearchResult {
        gyms,
        total_results,
        merged_count,
        avg_confidence,
        ..result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusteringConfig, ScoringPolicy};
    use crate::geocoding::{GeocodeCandidate, GeocodingApi};
    use crate::storage::InMemoryStorage;
    use crate::types::{Coordinates, GymDataSource, RawListing};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGeocoder;

    #[async_trait]
    impl GeocodingApi for FixedGeocoder {
        async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>> {
            if query.starts_with("Nowhere") {
                return Ok(vec![]);
            }
            Ok(vec![GeocodeCandidate {
                coordinates: Coordinates::new(30.2672, -97.7431).unwrap(),
                display_name: "Austin, Travis County, Texas, United States".to_string(),
                city: Some("Austin".to_string()),
                state: Some("Texas".to_string()),
                importance: 0.9,
            }])
        }
    }

    struct CountingProvider {
        name: &'static str,
        listings: Vec<RawListing>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl GymDataSource for CountingProvider {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_listings(
            &self,
            _coordinates: &Coordinates,
            _radius_miles: f64,
        ) -> Result<Vec<RawListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.listings.clone())
        }
    }

    fn listing(provider: &str, name: &str, lat: f64, lon: f64) -> RawListing {
        RawListing {
            provider_name: provider.to_string(),
            external_id: format!("{}-{}", provider, name),
            name: name.to_string(),
            address: "123 Main St".to_string(),
            coordinates: Coordinates::new(lat, lon).unwrap(),
            phone: Some("555-0100".to_string()),
            website: None,
            rating: Some(4.5),
            review_count: Some(10),
            raw_payload: serde_json::json!({}),
        }
    }

    fn service_with(
        providers: Vec<Arc<dyn GymDataSource>>,
        config: SearchConfig,
    ) -> SearchService {
        let scoring = ScoringPolicy::default();
        let clustering = ClusteringConfig::default();
        let storage: Arc<dyn Storage> =
            Arc::new(InMemoryStorage::new(scoring.clone(), clustering.clone()));

        SearchService::new(
            LocationResolver::new(Arc::new(FixedGeocoder)),
            MultiSourceFetcher::new(providers, &config),
            Reconciler::new(scoring, clustering),
            storage,
            FetchCoordinator::new(),
            Arc::new(ProgressPublisher::new(
                config.progress_buffer_size,
                config.progress_retention_seconds,
            )),
            config,
        )
    }

    fn counting_provider(
        name: &'static str,
        listings: Vec<RawListing>,
        delay_ms: u64,
    ) -> (Arc<dyn GymDataSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CountingProvider {
            name,
            listings,
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(delay_ms),
        });
        (provider, calls)
    }

    #[tokio::test]
    async fn test_inline_search_reconciles_across_providers() {
        // Same gym reported by both providers ~50m apart
        let (yelp, _) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            0,
        );
        let (google, _) = counting_provider(
            "google_places",
            vec![listing("google_places", "Iron Works", 30.26765, -97.7431)],
            0,
        );
        let service = service_with(vec![yelp, google], SearchConfig::default());

        let result = service
            .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), false)
            .await
            .unwrap();

        assert_eq!(result.total_results, 1);
        assert_eq!(result.merged_count, 1);
        assert_eq!(result.gyms[0].sources.len(), 2);
        assert_eq!(result.location_key, "austin, texas");
    }

    #[tokio::test]
    async fn test_second_search_served_from_persisted_data() {
        let (yelp, calls) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            0,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        service
            .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), false)
            .await
            .unwrap();
        let second = service
            .search_gyms("austin tx", Some(10.0), &SearchFilters::default(), false)
            .await
            .unwrap();

        // One provider call total: the second search hit fresh data
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.total_results, 1);
        assert_eq!(second.execution_time_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_freshness() {
        let (yelp, calls) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            0,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        service
            .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), false)
            .await
            .unwrap();
        service
            .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), true)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_searches_share_one_fetch() {
        // Slow provider so both searches overlap
        let (yelp, calls) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            200,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        let a = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), false)
                    .await
            })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .search_gyms("Austin, TX", Some(10.0), &SearchFilters::default(), false)
                    .await
            })
        };

        let result_a = a.await.unwrap().unwrap();
        let result_b = b.await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result_a.total_results, result_b.total_results);
    }

    #[tokio::test]
    async fn test_triggered_search_streams_progress_to_terminal() {
        let (yelp, _) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            0,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        let search_id = service.trigger_search("Austin, TX".to_string(), Some(10.0), false);
        let (snapshot, mut rx) = service.progress().subscribe(search_id).unwrap();
        assert!(!snapshot.status.is_terminal());

        let mut last_pct = snapshot.progress_percentage;
        let mut terminal = None;
        while let Ok(event) = rx.recv().await {
            assert!(event.progress_percentage >= last_pct);
            last_pct = event.progress_percentage;
            if event.status.is_terminal() {
                terminal = Some(event);
                break;
            }
        }

        let terminal = terminal.expect("search must reach a terminal state");
        assert_eq!(terminal.status, SearchStatus::Complete);
        assert_eq!(terminal.progress_percentage, 100.0);
    }

    #[tokio::test]
    async fn test_unresolvable_location_fails_the_search() {
        let (yelp, calls) = counting_provider("yelp", vec![], 0);
        let service = service_with(vec![yelp], SearchConfig::default());

        let search_id = service.trigger_search("Nowhere, ZZ".to_string(), None, false);
        let (_, mut rx) = service.progress().subscribe(search_id).unwrap();

        let mut terminal = None;
        while let Ok(event) = rx.recv().await {
            if event.status.is_terminal() {
                terminal = Some(event);
                break;
            }
        }

        let terminal = terminal.expect("search must reach a terminal state");
        assert_eq!(terminal.status, SearchStatus::Failed);
        // No provider was ever contacted
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_marks_search_failed() {
        let (yelp, _) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            60_000,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        let search_id = service.trigger_search("Austin, TX".to_string(), None, false);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(service.cancel_search(search_id));
        let status = service.progress().get_search_status(search_id).unwrap();
        assert_eq!(status.status, SearchStatus::Failed);

        // Second cancel is a no-op
        assert!(!service.cancel_search(search_id));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_a_no_op() {
        let (yelp, _) = counting_provider(
            "yelp",
            vec![listing("yelp", "Iron Works Gym", 30.2672, -97.7431)],
            0,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        let search_id = service.trigger_search("Austin, TX".to_string(), Some(10.0), false);
        let (snapshot, mut rx) = service.progress().subscribe(search_id).unwrap();
        if !snapshot.status.is_terminal() {
            while let Ok(event) = rx.recv().await {
                if event.status.is_terminal() {
                    break;
                }
            }
        }

        // The finished pipeline removed its own entry, so there is nothing
        // left to cancel and the terminal state stays Complete
        assert!(!service.cancel_search(search_id));
        let status = service.progress().get_search_status(search_id).unwrap();
        assert_eq!(status.status, SearchStatus::Complete);
    }

    #[test]
    fn test_filters_on_website_and_instagram_presence() {
        let entity = |name: &str, website: Option<&str>, instagram: Option<&str>| {
            crate::domain::GymEntity {
                id: None,
                name: name.to_string(),
                address: "addr".to_string(),
                coordinates: Coordinates::new(30.2672, -97.7431).unwrap(),
                phone: None,
                website: website.map(String::from),
                instagram: instagram.map(String::from),
                rating: None,
                review_count: None,
                sources: vec![],
                confidence: 0.7,
                match_confidence: 0.5,
                source_location: "austin, texas".to_string(),
                metropolitan_area_code: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        };
        let result = SearchResult {
            location_key: "austin, texas".to_string(),
            coordinates: Coordinates::new(30.2672, -97.7431).unwrap(),
            radius_miles: 10.0,
            timestamp: Utc::now(),
            gyms: vec![
                entity("Iron Works Gym", Some("https://ironworks.example"), None),
                entity("Garage Gym", None, Some("@garagegym")),
            ],
            total_results: 2,
            per_provider_counts: vec![],
            merged_count: 0,
            avg_confidence: 0.7,
            execution_time_seconds: 0.1,
        };

        let with_site = apply_filters(
            &result,
            &SearchFilters {
                has_website: Some(true),
                ..Default::default()
            },
        );
        assert_eq!(with_site.total_results, 1);
        assert_eq!(with_site.gyms[0].name, "Iron Works Gym");

        let no_instagram = apply_filters(
            &result,
            &SearchFilters {
                has_instagram: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(no_instagram.total_results, 1);
        assert_eq!(no_instagram.gyms[0].name, "Iron Works Gym");
    }

    #[tokio::test]
    async fn test_filters_narrow_and_rank_results() {
        let (yelp, _) = counting_provider(
            "yelp",
            vec![
                listing("yelp", "Iron Works Gym", 30.2672, -97.7431),
                listing("yelp", "Budget Fitness", 30.30, -97.70),
            ],
            0,
        );
        let service = service_with(vec![yelp], SearchConfig::default());

        let filtered = service
            .search_gyms(
                "Austin, TX",
                Some(10.0),
                &SearchFilters {
                    max_results: Some(1),
                    source: Some("yelp".to_string()),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(filtered.total_results, 1);

        let none = service
            .search_gyms(
                "Austin, TX",
                Some(10.0),
                &SearchFilters {
                    min_confidence: Some(0.99),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(none.total_results, 0);
    }
}
