use crate::constants::get_supported_providers;
use crate::domain::{FreshnessReport, ProviderCount, SearchResult};
use crate::error::Result;
use crate::storage::Storage;
use crate::types::Coordinates;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Read-side view over persisted entities that decides cache-hit vs miss
/// for a location key. No side effects.
pub struct FreshnessStore {
    storage: Arc<dyn Storage>,
}

impl FreshnessStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Report whether data exists for a location key and how stale it is.
    /// A location is fresh when its most recently refreshed entity is
    /// younger than `max_age_seconds`.
    pub async fn check_freshness(
        &self,
        location_key: &str,
        coordinates: &Coordinates,
        radius_miles: f64,
        max_age_seconds: i64,
    ) -> Result<FreshnessReport> {
        let gyms = self.storage.get_gyms_by_location_key(location_key).await?;

        let most_recent = match gyms.iter().map(|g| g.updated_at).max() {
            Some(most_recent) => most_recent,
            None => {
                return Ok(FreshnessReport {
                    has_data: false,
                    age_seconds: None,
                    cached_result: None,
                })
            }
        };
        let age_seconds = (Utc::now() - most_recent).num_seconds();

        debug!(
            "Location '{}' has {} persisted gyms, age {}s (max {}s)",
            location_key,
            gyms.len(),
            age_seconds,
            max_age_seconds
        );

        let cached_result = if age_seconds <= max_age_seconds {
            Some(build_cached_result(
                location_key,
                coordinates,
                radius_miles,
                gyms,
            ))
        } else {
            None
        };

        Ok(FreshnessReport {
            has_data: true,
            age_seconds: Some(age_seconds),
            cached_result,
        })
    }
}

/// Assemble a SearchResult from persisted entities, recomputing the
/// per-provider and aggregate stats the same way a fresh search would.
pub fn build_cached_result(
    location_key: &str,
    coordinates: &Coordinates,
    radius_miles: f64,
    gyms: Vec<crate::domain::GymEntity>,
) -> SearchResult {
    let per_provider_counts = get_supported_providers()
        .into_iter()
        .map(|provider| {
            let count = gyms.iter().filter(|g| g.has_source(provider)).count();
            ProviderCount::ok(provider, count)
        })
        .collect();

    let merged_count = gyms.iter().filter(|g| g.sources.len() > 1).count();
    let avg_confidence = if gyms.is_empty() {
        0.0
    } else {
        gyms.iter().map(|g| g.confidence).sum::<f64>() / gyms.len() as f64
    };
    let total_results = gyms.len();

    SearchResult {
        location_key: location_key.to_string(),
        coordinates: *coordinates,
        radius_miles,
        timestamp: Utc::now(),
        gyms,
        total_results,
        per_provider_counts,
        merged_count,
        avg_confidence,
        execution_time_seconds: 0.0,
    }
}
