use crate::domain;
use crate::graphql::types::Gym;
use crate::search;
use async_graphql::{Enum, InputObject, Object, ID};

/// GraphQL representation of a completed search
#[derive(Clone)]
pub struct SearchResult {
    pub inner: domain::SearchResult,
}

impl From<domain::SearchResult> for SearchResult {
    fn from(result: domain::SearchResult) -> Self {
        Self { inner: result }
    }
}

#[Object]
impl SearchResult {
    /// Normalized location key the search resolved to
    async fn location_key(&self) -> &str {
        &self.inner.location_key
    }

    /// Latitude of the resolved search center
    async fn latitude(&self) -> f64 {
        self.inner.coordinates.latitude
    }

    /// Longitude of the resolved search center
    async fn longitude(&self) -> f64 {
        self.inner.coordinates.longitude
    }

    /// Search radius in miles
    async fn radius_miles(&self) -> f64 {
        self.inner.radius_miles
    }

    /// When the search completed
    async fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.timestamp
    }

    /// The reconciled gym entities
    async fn gyms(&self) -> Vec<Gym> {
        self.inner.gyms.iter().cloned().map(Gym::from).collect()
    }

    /// Total number of gyms after reconciliation and filtering
    async fn total_results(&self) -> i32 {
        self.inner.total_results as i32
    }

    /// Per-provider listing counts, including failed providers
    async fn provider_counts(&self) -> Vec<ProviderCount> {
        self.inner
            .per_provider_counts
            .iter()
            .cloned()
            .map(ProviderCount::from)
            .collect()
    }

    /// How many entities merged listings from more than one provider
    async fn merged_count(&self) -> i32 {
        self.inner.merged_count as i32
    }

    /// Average canonical confidence across returned gyms
    async fn avg_confidence(&self) -> f64 {
        self.inner.avg_confidence
    }

    /// Wall-clock seconds the search took; zero for cached results
    async fn execution_time_seconds(&self) -> f64 {
        self.inner.execution_time_seconds
    }
}

/// How many listings one provider contributed to a search
#[derive(Clone)]
pub struct ProviderCount {
    inner: domain::ProviderCount,
}

impl From<domain::ProviderCount> for ProviderCount {
    fn from(count: domain::ProviderCount) -> Self {
        Self { inner: count }
    }
}

#[Object]
impl ProviderCount {
    /// The provider's stable name
    async fn provider(&self) -> &str {
        &self.inner.provider_name
    }

    /// Human-readable provider name
    async fn display_name(&self) -> String {
        crate::constants::provider_display_name(&self.inner.provider_name)
    }

    /// Listings this provider returned
    async fn count(&self) -> i32 {
        self.inner.count as i32
    }

    /// Whether the provider failed during this search
    async fn errored(&self) -> bool {
        self.inner.errored
    }

    /// The provider's error, when it failed
    async fn error_message(&self) -> Option<&str> {
        self.inner.error_message.as_deref()
    }
}

/// Lifecycle states of a search pipeline run
#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum SearchStatus {
    Queued,
    ResolvingLocation,
    Fetching,
    Reconciling,
    Persisting,
    Complete,
    Failed,
}

impl From<domain::SearchStatus> for SearchStatus {
    fn from(status: domain::SearchStatus) -> Self {
        match status {
            domain::SearchStatus::Queued => SearchStatus::Queued,
            domain::SearchStatus::ResolvingLocation => SearchStatus::ResolvingLocation,
            domain::SearchStatus::Fetching => SearchStatus::Fetching,
            domain::SearchStatus::Reconciling => SearchStatus::Reconciling,
            domain::SearchStatus::Persisting => SearchStatus::Persisting,
            domain::SearchStatus::Complete => SearchStatus::Complete,
            domain::SearchStatus::Failed => SearchStatus::Failed,
        }
    }
}

/// One progress event for an in-flight search
#[derive(Clone)]
pub struct SearchProgressEvent {
    pub inner: domain::SearchProgress,
}

impl From<domain::SearchProgress> for SearchProgressEvent {
    fn from(progress: domain::SearchProgress) -> Self {
        Self { inner: progress }
    }
}

#[Object]
impl SearchProgressEvent {
    /// The search this event belongs to
    async fn search_id(&self) -> ID {
        ID(self.inner.search_id.to_string())
    }

    /// Current pipeline stage
    async fn status(&self) -> SearchStatus {
        self.inner.status.into()
    }

    /// 0-100, non-decreasing within one search
    async fn progress_percentage(&self) -> f64 {
        self.inner.progress_percentage
    }

    /// Human-readable description of the current step
    async fn current_step(&self) -> &str {
        &self.inner.current_step
    }

    /// Rough completion estimate; absent once terminal
    async fn estimated_completion(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.estimated_completion
    }

    /// Extra detail, e.g. a result summary or failure reason
    async fn message(&self) -> Option<&str> {
        self.inner.message.as_deref()
    }
}

/// Caller-supplied result filters
#[derive(InputObject, Default)]
pub struct SearchFiltersInput {
    /// Keep only gyms at or above this canonical confidence
    pub min_confidence: Option<f64>,
    /// Keep only gyms at or above this rating
    pub min_rating: Option<f64>,
    /// Keep only gyms backed by this provider
    pub source: Option<String>,
    /// Keep only gyms with (true) or without (false) a website
    pub has_website: Option<bool>,
    /// Keep only gyms with (true) or without (false) an Instagram handle
    pub has_instagram: Option<bool>,
    /// Cap the number of returned gyms, best confidence first
    pub max_results: Option<i32>,
}

impl From<SearchFiltersInput> for search::SearchFilters {
    fn from(input: SearchFiltersInput) -> Self {
        Self {
            min_confidence: input.min_confidence,
            min_rating: input.min_rating,
            source: input.source,
            has_website: input.has_website,
            has_instagram: input.has_instagram,
            max_results: input.max_results.map(|m| m.max(0) as usize),
        }
    }
}
