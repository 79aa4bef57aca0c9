use crate::constants::GOOGLE_PLACES_PROVIDER;
use crate::error::{GymIntelError, Result};
use crate::types::{Coordinates, GymDataSource, RawListing};
use serde_json::Value;
use tracing::{debug, info, instrument};

const NEARBY_SEARCH_URL: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
/// Nearby Search caps the radius parameter at 50km
const GOOGLE_MAX_RADIUS_METERS: f64 = 50_000.0;

pub struct GooglePlacesProvider {
    client: reqwest::Client,
    api_key: String,
}

impl GooglePlacesProvider {
    /// Reads `GOOGLE_PLACES_API_KEY` from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_PLACES_API_KEY")?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    fn parse_place(place: &Value) -> Result<RawListing> {
        let name = place["name"].as_str().ok_or_else(|| GymIntelError::Api {
            message: "Google place missing name".into(),
        })?;
        let place_id = place["place_id"]
            .as_str()
            .ok_or_else(|| GymIntelError::Api {
                message: "Google place missing place_id".into(),
            })?;

        let latitude = place["geometry"]["location"]["lat"].as_f64().unwrap_or(0.0);
        let longitude = place["geometry"]["location"]["lng"].as_f64().unwrap_or(0.0);
        let coordinates =
            Coordinates::new(latitude, longitude).ok_or_else(|| GymIntelError::Api {
                message: format!("Google place '{}' has invalid coordinates", name),
            })?;

        Ok(RawListing {
            provider_name: GOOGLE_PLACES_PROVIDER.to_string(),
            external_id: place_id.to_string(),
            name: name.to_string(),
            address: place["vicinity"]
                .as_str()
                .or_else(|| place["formatted_address"].as_str())
                .unwrap_or_default()
                .to_string(),
            coordinates,
            // Nearby Search responses carry no phone/website; those would
            // need a Place Details call per result
            phone: None,
            website: None,
            rating: place["rating"].as_f64(),
            review_count: place["user_ratings_total"].as_i64().map(|c| c as i32),
            raw_payload: place.clone(),
        })
    }
}

#[async_trait::async_trait]
impl GymDataSource for GooglePlacesProvider {
    fn provider_name(&self) -> &'static str {
        GOOGLE_PLACES_PROVIDER
    }

    #[instrument(skip(self))]
    async fn fetch_listings(
        &self,
        coordinates: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<RawListing>> {
        let radius_meters = (radius_miles * crate::constants::METERS_PER_MILE)
            .min(GOOGLE_MAX_RADIUS_METERS) as u32;

        let response = self
            .client
            .get(NEARBY_SEARCH_URL)
            .query(&[
                (
                    "location",
                    format!("{},{}", coordinates.latitude, coordinates.longitude),
                ),
                ("radius", radius_meters.to_string()),
                ("type", "gym".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;

        let status = data["status"].as_str().unwrap_or("UNKNOWN");
        if status != "OK" && status != "ZERO_RESULTS" {
            return Err(GymIntelError::Api {
                message: format!("Google Places returned status {}", status),
            });
        }

        let results = data["results"].as_array().ok_or_else(|| GymIntelError::Api {
            message: "results not found in Google Places response".into(),
        })?;

        let mut listings = Vec::new();
        for place in results {
            match Self::parse_place(place) {
                Ok(listing) => listings.push(listing),
                Err(e) => debug!("Skipping unparseable Google place: {}", e),
            }
        }

        info!(
            "Successfully fetched {} listings from Google Places",
            listings.len()
        );
        Ok(listings)
    }
}
