pub mod google_places;
pub mod openstreetmap;
pub mod yelp;

pub use google_places::GooglePlacesProvider;
pub use openstreetmap::OpenStreetMapProvider;
pub use yelp::YelpProvider;

use crate::config::SearchConfig;
use crate::domain::ProviderCount;
use crate::error::{GymIntelError, Result};
use crate::types::{Coordinates, GymDataSource, ProviderError, ProviderErrorKind, RawListing};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Per-provider fetch outcome map
#[derive(Debug, Default)]
pub struct PerProviderResults {
    pub outcomes: Vec<(String, std::result::Result<Vec<RawListing>, ProviderError>)>,
}

impl PerProviderResults {
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|(_, r)| r.is_err())
    }

    /// Flattened listings from the providers that succeeded
    pub fn successful_listings(&self) -> Vec<RawListing> {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .flatten()
            .cloned()
            .collect()
    }

    /// Counts for the result surface, zero-count with error flag for
    /// providers that were unavailable.
    pub fn provider_counts(&self) -> Vec<ProviderCount> {
        self.outcomes
            .iter()
            .map(|(provider, outcome)| match outcome {
                Ok(listings) => ProviderCount::ok(provider, listings.len()),
                Err(error) => ProviderCount::failed(error),
            })
            .collect()
    }
}

/// Invokes every configured provider for a location, isolating failures:
/// one provider's timeout or error never aborts the others. The aggregate
/// deadline settles with whatever provider results have completed.
pub struct MultiSourceFetcher {
    providers: Vec<Arc<dyn GymDataSource>>,
    provider_timeout: Duration,
    aggregate_timeout: Duration,
}

impl MultiSourceFetcher {
    pub fn new(providers: Vec<Arc<dyn GymDataSource>>, config: &SearchConfig) -> Self {
        Self {
            providers,
            provider_timeout: Duration::from_secs(config.provider_timeout_seconds),
            aggregate_timeout: Duration::from_secs(config.aggregate_timeout_seconds),
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.provider_name().to_string())
            .collect()
    }

    /// Fetch from all providers concurrently. `on_provider_complete` fires
    /// once per provider as its call settles, with (name, settled, total).
    /// Fails only when every provider failed.
    pub async fn fetch_all<F>(
        &self,
        coordinates: &Coordinates,
        radius_miles: f64,
        mut on_provider_complete: F,
    ) -> Result<PerProviderResults>
    where
        F: FnMut(&str, usize, usize),
    {
        if self.providers.is_empty() {
            return Err(GymIntelError::AllProvidersUnavailable);
        }

        let deadline = Instant::now() + self.aggregate_timeout;
        let total = self.providers.len();

        // Every provider call runs in its own task so one slow provider
        // cannot starve the others.
        let mut handles = Vec::with_capacity(total);
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let coordinates = *coordinates;
            let provider_timeout = self.provider_timeout;
            let name = provider.provider_name().to_string();

            handles.push((
                name,
                tokio::spawn(async move {
                    tokio::time::timeout(
                        provider_timeout,
                        provider.fetch_listings(&coordinates, radius_miles),
                    )
                    .await
                }),
            ));
        }

        let mut results = PerProviderResults::default();
        for (settled, (name, handle)) in handles.into_iter().enumerate() {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                // Provider finished inside its own timeout
                Ok(Ok(Ok(Ok(listings)))) => Ok(listings),
                Ok(Ok(Ok(Err(e)))) => Err(classify_provider_error(&name, &e)),
                // Per-provider timeout elapsed
                Ok(Ok(Err(_elapsed))) => Err(ProviderError {
                    provider_name: name.clone(),
                    kind: ProviderErrorKind::Timeout,
                    message: format!(
                        "timed out after {}s",
                        self.provider_timeout.as_secs()
                    ),
                }),
                // Task panicked
                Ok(Err(join_error)) => Err(ProviderError {
                    provider_name: name.clone(),
                    kind: ProviderErrorKind::Unavailable,
                    message: format!("provider task failed: {}", join_error),
                }),
                // Aggregate deadline hit; settle with what we have
                Err(_) => Err(ProviderError {
                    provider_name: name.clone(),
                    kind: ProviderErrorKind::Timeout,
                    message: "aggregate fetch deadline exceeded".to_string(),
                }),
            };

            match &outcome {
                Ok(listings) => info!("Provider {} returned {} listings", name, listings.len()),
                Err(e) => warn!("Provider {} unavailable: {}", name, e.message),
            }

            results.outcomes.push((name.clone(), outcome));
            on_provider_complete(&name, settled + 1, total);
        }

        if results.all_failed() {
            return Err(GymIntelError::AllProvidersUnavailable);
        }

        Ok(results)
    }
}

fn classify_provider_error(provider: &str, error: &GymIntelError) -> ProviderError {
    let kind = match error {
        GymIntelError::Http(e) if e.is_timeout() => ProviderErrorKind::Timeout,
        GymIntelError::Http(e)
            if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
        {
            ProviderErrorKind::RateLimited
        }
        GymIntelError::Json(_) => ProviderErrorKind::MalformedResponse,
        GymIntelError::Api { .. } => ProviderErrorKind::MalformedResponse,
        _ => ProviderErrorKind::Unavailable,
    };

    ProviderError {
        provider_name: provider.to_string(),
        kind,
        message: error.to_string(),
    }
}
