use crate::constants::OPENSTREETMAP_PROVIDER;
use crate::error::{GymIntelError, Result};
use crate::types::{Coordinates, GymDataSource, RawListing};
use serde_json::Value;
use tracing::{debug, info, instrument};

const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Keyless provider backed by the Overpass API. Lower metadata quality
/// than the commercial providers, reflected in its reliability prior.
pub struct OpenStreetMapProvider {
    client: reqwest::Client,
}

impl Default for OpenStreetMapProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenStreetMapProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("gymintel-scraper/0.1")
                .build()
                .unwrap_or_default(),
        }
    }

    fn parse_element(element: &Value) -> Option<RawListing> {
        let tags = element.get("tags")?;
        let name = tags.get("name")?.as_str()?;

        // Ways carry a precomputed center; nodes carry lat/lon directly
        let (lat, lon) = match (element["lat"].as_f64(), element["lon"].as_f64()) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => (
                element["center"]["lat"].as_f64()?,
                element["center"]["lon"].as_f64()?,
            ),
        };
        let coordinates = Coordinates::new(lat, lon)?;

        let address = [
            tags.get("addr:housenumber").and_then(Value::as_str),
            tags.get("addr:street").and_then(Value::as_str),
            tags.get("addr:city").and_then(Value::as_str),
        ]
        .iter()
        .filter_map(|p| *p)
        .collect::<Vec<_>>()
        .join(" ");

        Some(RawListing {
            provider_name: OPENSTREETMAP_PROVIDER.to_string(),
            external_id: element["id"].as_i64().unwrap_or_default().to_string(),
            name: name.to_string(),
            address,
            coordinates,
            phone: tags
                .get("phone")
                .or_else(|| tags.get("contact:phone"))
                .and_then(Value::as_str)
                .map(String::from),
            website: tags
                .get("website")
                .or_else(|| tags.get("contact:website"))
                .and_then(Value::as_str)
                .map(String::from),
            rating: None,
            review_count: None,
            raw_payload: element.clone(),
        })
    }
}

#[async_trait::async_trait]
impl GymDataSource for OpenStreetMapProvider {
    fn provider_name(&self) -> &'static str {
        OPENSTREETMAP_PROVIDER
    }

    #[instrument(skip(self))]
    async fn fetch_listings(
        &self,
        coordinates: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<RawListing>> {
        let radius_meters = (radius_miles * crate::constants::METERS_PER_MILE) as u32;

        let query = format!(
            r#"[out:json][timeout:25];
(
  node["leisure"="fitness_centre"](around:{radius},{lat},{lon});
  way["leisure"="fitness_centre"](around:{radius},{lat},{lon});
);
out center;"#,
            radius = radius_meters,
            lat = coordinates.latitude,
            lon = coordinates.longitude,
        );

        let response = self
            .client
            .post(OVERPASS_URL)
            .body(query)
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;
        let elements = data["elements"]
            .as_array()
            .ok_or_else(|| GymIntelError::Api {
                message: "elements not found in Overpass response".into(),
            })?;

        let listings: Vec<RawListing> = elements
            .iter()
            .filter_map(Self::parse_element)
            .collect();

        debug!(
            "Overpass returned {} elements, {} with usable names",
            elements.len(),
            listings.len()
        );
        info!(
            "Successfully fetched {} listings from OpenStreetMap",
            listings.len()
        );
        Ok(listings)
    }
}
