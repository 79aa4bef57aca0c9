use crate::types::{Coordinates, ProviderError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One provider's contribution to a canonical entity.
/// A provider never appears twice in an entity's source list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub provider_name: String,
    pub per_source_confidence: f64,
    pub last_updated: DateTime<Utc>,
}

/// The canonical merged representation of a gym after reconciling
/// multiple providers' listings.
///
/// `confidence` is always derived from `sources`; it is recomputed by the
/// reconciliation engine and never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymEntity {
    pub id: Option<Uuid>,
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub sources: Vec<SourceAttribution>,
    pub confidence: f64,
    pub match_confidence: f64,
    /// Location key of the search that produced or last refreshed this entity
    pub source_location: String,
    pub metropolitan_area_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GymEntity {
    pub fn has_source(&self, provider_name: &str) -> bool {
        self.sources.iter().any(|s| s.provider_name == provider_name)
    }
}

/// Result of resolving a free-text location input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    /// Normalized cache/dedup key; geocode-equivalent inputs share one key
    pub location_key: String,
    pub display_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Lifecycle states of one search pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Queued,
    ResolvingLocation,
    Fetching,
    Reconciling,
    Persisting,
    Complete,
    Failed,
}

impl SearchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchStatus::Complete | SearchStatus::Failed)
    }
}

/// Progress snapshot for an in-flight search, delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    pub search_id: Uuid,
    pub status: SearchStatus,
    /// 0-100, monotonically non-decreasing within one search
    pub progress_percentage: f64,
    pub current_step: String,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Per-provider result count, with a flag when the provider errored out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCount {
    pub provider_name: String,
    pub count: usize,
    pub errored: bool,
    pub error_message: Option<String>,
}

impl ProviderCount {
    pub fn ok(provider_name: &str, count: usize) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            count,
            errored: false,
            error_message: None,
        }
    }

    pub fn failed(error: &ProviderError) -> Self {
        Self {
            provider_name: error.provider_name.clone(),
            count: 0,
            errored: true,
            error_message: Some(error.message.clone()),
        }
    }
}

/// The merged, scored outcome of one location search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub location_key: String,
    pub coordinates: Coordinates,
    pub radius_miles: f64,
    pub timestamp: DateTime<Utc>,
    pub gyms: Vec<GymEntity>,
    pub total_results: usize,
    pub per_provider_counts: Vec<ProviderCount>,
    /// Entities backed by more than one provider
    pub merged_count: usize,
    pub avg_confidence: f64,
    pub execution_time_seconds: f64,
}

/// Freshness report for a location key
#[derive(Debug, Clone)]
pub struct FreshnessReport {
    pub has_data: bool,
    pub age_seconds: Option<i64>,
    pub cached_result: Option<SearchResult>,
}

/// Outcome of an upsert batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub created: usize,
    pub updated: usize,
}

/// Aggregate statistics for gyms in an area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymAnalytics {
    pub location: String,
    pub total_gyms: usize,
    /// JSON histogram of confidence buckets, e.g. {"0.0-0.2": 1, ...}
    pub confidence_distribution: String,
    /// JSON map of provider name to contributing entity count
    pub source_breakdown: String,
    /// JSON rating stats: count, average, min, max
    pub rating_analysis: String,
    /// Gyms per square mile of the analyzed disc
    pub density_score: f64,
    pub market_saturation: String,
}

/// A sub-region scored by estimated unmet demand for gyms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketGap {
    pub area_description: String,
    pub coordinates: Coordinates,
    pub gap_score: f64,
    pub population_density: f64,
    pub nearest_gym_distance: f64,
    pub reasoning: String,
}
