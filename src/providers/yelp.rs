use crate::constants::YELP_PROVIDER;
use crate::error::{GymIntelError, Result};
use crate::types::{Coordinates, GymDataSource, RawListing};
use serde_json::Value;
use tracing::{debug, info, instrument};

const YELP_SEARCH_URL: &str = "https://api.yelp.com/v3/businesses/search";
/// Yelp caps the radius parameter at 40km
const YELP_MAX_RADIUS_METERS: f64 = 40_000.0;

pub struct YelpProvider {
    client: reqwest::Client,
    api_key: String,
}

impl YelpProvider {
    /// Reads `YELP_API_KEY` from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("YELP_API_KEY")?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
        })
    }

    fn parse_business(business: &Value) -> Result<RawListing> {
        let name = business["name"]
            .as_str()
            .ok_or_else(|| GymIntelError::Api {
                message: "Yelp business missing name".into(),
            })?;
        let id = business["id"].as_str().ok_or_else(|| GymIntelError::Api {
            message: "Yelp business missing id".into(),
        })?;

        let latitude = business["coordinates"]["latitude"].as_f64().unwrap_or(0.0);
        let longitude = business["coordinates"]["longitude"].as_f64().unwrap_or(0.0);
        let coordinates =
            Coordinates::new(latitude, longitude).ok_or_else(|| GymIntelError::Api {
                message: format!("Yelp business '{}' has invalid coordinates", name),
            })?;

        let address = business["location"]["display_address"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Ok(RawListing {
            provider_name: YELP_PROVIDER.to_string(),
            external_id: id.to_string(),
            name: name.to_string(),
            address,
            coordinates,
            phone: business["display_phone"]
                .as_str()
                .filter(|p| !p.is_empty())
                .map(String::from),
            website: business["url"].as_str().map(String::from),
            rating: business["rating"].as_f64(),
            review_count: business["review_count"].as_i64().map(|c| c as i32),
            raw_payload: business.clone(),
        })
    }
}

#[async_trait::async_trait]
impl GymDataSource for YelpProvider {
    fn provider_name(&self) -> &'static str {
        YELP_PROVIDER
    }

    #[instrument(skip(self))]
    async fn fetch_listings(
        &self,
        coordinates: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<RawListing>> {
        let radius_meters =
            (radius_miles * crate::constants::METERS_PER_MILE).min(YELP_MAX_RADIUS_METERS) as u32;

        let response = self
            .client
            .get(YELP_SEARCH_URL)
            .bearer_auth(&self.api_key)
            .query(&[
                ("term", "gym"),
                ("categories", "gyms,fitness"),
                ("latitude", &coordinates.latitude.to_string()),
                ("longitude", &coordinates.longitude.to_string()),
                ("radius", &radius_meters.to_string()),
                ("limit", "50"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;
        let businesses = data["businesses"]
            .as_array()
            .ok_or_else(|| GymIntelError::Api {
                message: "businesses not found in Yelp response".into(),
            })?;

        let mut listings = Vec::new();
        for business in businesses {
            match Self::parse_business(business) {
                Ok(listing) => listings.push(listing),
                Err(e) => debug!("Skipping unparseable Yelp business: {}", e),
            }
        }

        info!("Successfully fetched {} listings from Yelp", listings.len());
        Ok(listings)
    }
}
