use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Geographic coordinates with validated ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self { latitude, longitude })
    }

    /// Great-circle distance to another point, in meters
    pub fn haversine_distance_meters(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }
}

/// One provider's view of a business. Ephemeral; never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub provider_name: String,
    pub external_id: String,
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    /// Original provider payload, carried for debugging and re-processing
    pub raw_payload: serde_json::Value,
}

impl RawListing {
    /// Fraction of optional contact/quality fields that are populated.
    /// Feeds per-source confidence scoring.
    pub fn completeness(&self) -> f64 {
        let fields = [
            self.phone.is_some(),
            self.website.is_some(),
            self.rating.is_some(),
            self.review_count.is_some(),
        ];
        let present = fields.iter().filter(|f| **f).count();
        present as f64 / fields.len() as f64
    }
}

/// A provider-level failure, recorded as search metadata rather than
/// aborting the overall fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub provider_name: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderErrorKind {
    Timeout,
    RateLimited,
    MalformedResponse,
    Unavailable,
}

/// Core trait that all gym data providers must implement
#[async_trait::async_trait]
pub trait GymDataSource: Send + Sync {
    /// Unique identifier for this provider
    fn provider_name(&self) -> &'static str;

    /// Fetch all gym listings near the given point
    async fn fetch_listings(
        &self,
        coordinates: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<RawListing>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_range_validation() {
        assert!(Coordinates::new(47.6131, -122.3424).is_some());
        assert!(Coordinates::new(90.1, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
    }

    #[test]
    fn test_haversine_distance() {
        let a = Coordinates::new(47.6131, -122.3424).unwrap();
        assert_eq!(a.haversine_distance_meters(&a), 0.0);

        // Seattle downtown to Space Needle is roughly 1.5km
        let b = Coordinates::new(47.6205, -122.3493).unwrap();
        let d = a.haversine_distance_meters(&b);
        assert!(d > 500.0 && d < 2000.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_completeness_fraction() {
        let listing = RawListing {
            provider_name: "yelp".into(),
            external_id: "abc".into(),
            name: "Iron Works Gym".into(),
            address: "123 Main St".into(),
            coordinates: Coordinates::new(30.26, -97.74).unwrap(),
            phone: Some("512-555-0100".into()),
            website: None,
            rating: Some(4.5),
            review_count: None,
            raw_payload: serde_json::json!({}),
        };
        assert!((listing.completeness() - 0.5).abs() < 1e-9);
    }
}
