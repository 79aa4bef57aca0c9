use crate::domain::ResolvedLocation;
use crate::error::{GymIntelError, Result};
use crate::types::Coordinates;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// US zipcode pattern: 5 digits or 5+4 format
static ZIPCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());

/// Two candidates whose importance differs by less than this are
/// considered equally ranked.
const AMBIGUITY_IMPORTANCE_DELTA: f64 = 0.05;

/// One ranked candidate from the geocoding backend
#[derive(Debug, Clone)]
pub struct GeocodeCandidate {
    pub coordinates: Coordinates,
    pub display_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub importance: f64,
}

/// Port for the external geocoding capability
#[async_trait]
pub trait GeocodingApi: Send + Sync {
    /// Return ranked candidates for a free-text query, best first
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>>;
}

/// Nominatim-backed geocoder
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NominatimGeocoder {
    pub fn new() -> Self {
        Self::with_base_url("https://nominatim.openstreetmap.org")
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("gymintel-scraper/0.1")
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Extract city name from Nominatim address components
    fn extract_city(address: &Value) -> Option<String> {
        let city_keys = ["city", "town", "village", "municipality", "suburb"];
        for key in city_keys {
            if let Some(city) = address.get(key).and_then(Value::as_str) {
                return Some(city.to_string());
            }
        }
        None
    }

    fn parse_candidate(item: &Value) -> Option<GeocodeCandidate> {
        let latitude: f64 = item.get("lat")?.as_str()?.parse().ok()?;
        let longitude: f64 = item.get("lon")?.as_str()?.parse().ok()?;
        let coordinates = Coordinates::new(latitude, longitude)?;

        let address = item.get("address").cloned().unwrap_or(Value::Null);

        Some(GeocodeCandidate {
            coordinates,
            display_name: item
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            city: Self::extract_city(&address),
            state: address
                .get("state")
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
            importance: item.get("importance").and_then(Value::as_f64).unwrap_or(0.0),
        })
    }
}

#[async_trait]
impl GeocodingApi for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodeCandidate>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("countrycodes", "us"),
                ("limit", "5"),
            ])
            .send()
            .await?;

        let items: Vec<Value> = response.json().await?;
        debug!("Geocoder returned {} candidates for '{}'", items.len(), query);

        Ok(items.iter().filter_map(Self::parse_candidate).collect())
    }
}

/// Turns a free-text location into normalized coordinates and a canonical
/// location key. Pure lookup; no side effects beyond the geocoding call.
pub struct LocationResolver {
    geocoder: Arc<dyn GeocodingApi>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn GeocodingApi>) -> Self {
        Self { geocoder }
    }

    pub async fn resolve(&self, input: &str) -> Result<ResolvedLocation> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(GymIntelError::LocationNotFound("(empty input)".to_string()));
        }

        // Zipcodes geocode more reliably with an explicit country suffix
        let query = if ZIPCODE_RE.is_match(trimmed) {
            format!("{}, USA", trimmed)
        } else if trimmed.to_lowercase().contains("usa") {
            trimmed.to_string()
        } else {
            format!("{}, USA", trimmed)
        };

        let candidates = self.geocoder.geocode(&query).await?;

        let best = match candidates.first() {
            Some(best) => best,
            None => {
                warn!("No geocoding candidate for '{}'", trimmed);
                return Err(GymIntelError::LocationNotFound(trimmed.to_string()));
            }
        };

        if let Some(second) = candidates.get(1) {
            let equally_ranked = (best.importance - second.importance).abs()
                < AMBIGUITY_IMPORTANCE_DELTA
                && best.display_name != second.display_name;
            if equally_ranked {
                warn!(
                    "Ambiguous location '{}': '{}' vs '{}'",
                    trimmed, best.display_name, second.display_name
                );
                return Err(GymIntelError::AmbiguousLocation(trimmed.to_string()));
            }
        }

        let location_key = Self::location_key(trimmed, best);
        info!("Resolved '{}' to key '{}'", trimmed, location_key);

        Ok(ResolvedLocation {
            coordinates: best.coordinates,
            location_key,
            display_name: best.display_name.clone(),
            city: best.city.clone(),
            state: best.state.clone(),
        })
    }

    /// Canonical cache/dedup key. Two textually different but
    /// geocode-equivalent inputs must land on the same key, so the key is
    /// built from the resolved city/state rather than the raw query.
    fn location_key(raw_query: &str, candidate: &GeocodeCandidate) -> String {
        match (&candidate.city, &candidate.state) {
            (Some(city), Some(state)) => {
                format!("{}, {}", city.to_lowercase(), state.to_lowercase())
            }
            (Some(city), None) => city.to_lowercase(),
            _ => raw_query.to_lowercase(),
        }
    }
}
