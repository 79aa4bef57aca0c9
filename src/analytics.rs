use crate::domain::{GymAnalytics, GymEntity, MarketGap};
use crate::error::Result;
use crate::storage::Storage;
use crate::types::Coordinates;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Grid resolution for market-gap analysis: the searched disc is covered
/// by an N x N lattice of sub-region centers.
const GAP_GRID_SIZE: usize = 4;

/// Gap scores below this are not worth reporting
const GAP_SCORE_FLOOR: f64 = 0.3;

/// Source of population density estimates for gap analysis. Injected so a
/// census-backed implementation can replace the default heuristic.
pub trait PopulationModel: Send + Sync {
    /// Estimated residents per square mile around a point
    fn density_at(&self, coordinates: &Coordinates) -> f64;
}

/// Default model: a flat urban-ish baseline that decays with distance from
/// the search center. A stand-in until a census dataset is wired up.
pub struct UniformPopulationModel {
    pub center: Coordinates,
    pub peak_density: f64,
}

impl PopulationModel for UniformPopulationModel {
    fn density_at(&self, coordinates: &Coordinates) -> f64 {
        let distance_miles = self.center.haversine_distance_meters(coordinates)
            / crate::constants::METERS_PER_MILE;
        // Linear decay out to 20 miles from center
        let falloff = (1.0 - distance_miles / 20.0).max(0.1);
        self.peak_density * falloff
    }
}

/// Read-side aggregate statistics over persisted entities.
/// Never mutates the store.
pub struct AnalyticsEngine {
    storage: Arc<dyn Storage>,
}

impl AnalyticsEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Aggregate statistics for gyms within a radius of a point
    pub async fn analyze(
        &self,
        location: &str,
        center: &Coordinates,
        radius_miles: f64,
    ) -> Result<GymAnalytics> {
        let gyms = self.storage.get_gyms_in_radius(center, radius_miles).await?;

        if gyms.is_empty() {
            return Ok(GymAnalytics {
                location: location.to_string(),
                total_gyms: 0,
                confidence_distribution: "{}".to_string(),
                source_breakdown: "{}".to_string(),
                rating_analysis: "{}".to_string(),
                density_score: 0.0,
                market_saturation: "low".to_string(),
            });
        }

        let total_gyms = gyms.len();
        debug!("Analyzing {} gyms around '{}'", total_gyms, location);

        let confidence_distribution = confidence_histogram(&gyms);
        let source_breakdown = source_counts(&gyms);
        let rating_analysis = rating_stats(&gyms);

        // Gyms per square mile of the searched disc
        let area_sq_miles = std::f64::consts::PI * radius_miles * radius_miles;
        let density_score = total_gyms as f64 / area_sq_miles;

        let market_saturation = if density_score > 0.15 {
            "high"
        } else if density_score > 0.05 {
            "medium"
        } else {
            "low"
        };

        Ok(GymAnalytics {
            location: location.to_string(),
            total_gyms,
            confidence_distribution: serde_json::to_string(&confidence_distribution)?,
            source_breakdown: serde_json::to_string(&source_breakdown)?,
            rating_analysis: rating_analysis.to_string(),
            density_score,
            market_saturation: market_saturation.to_string(),
        })
    }

    /// Partition the search radius into sub-regions and score each by
    /// population density and inverse proximity to the nearest gym.
    /// Higher gap score means higher estimated underserved demand.
    pub async fn market_gap_analysis(
        &self,
        location: &str,
        center: &Coordinates,
        radius_miles: f64,
        population: &dyn PopulationModel,
    ) -> Result<Vec<MarketGap>> {
        let gyms = self.storage.get_gyms_in_radius(center, radius_miles).await?;

        let mut gaps = Vec::new();
        let radius_meters = radius_miles * crate::constants::METERS_PER_MILE;

        // Degrees per meter, longitude corrected for latitude
        let lat_step = radius_meters / 111_000.0;
        let lon_step = radius_meters / (111_000.0 * center.latitude.to_radians().cos());

        for gy in 0..GAP_GRID_SIZE {
            for gx in 0..GAP_GRID_SIZE {
                // Cell centers spread across [-1, 1] of the radius
                let fy = (gy as f64 + 0.5) / GAP_GRID_SIZE as f64 * 2.0 - 1.0;
                let fx = (gx as f64 + 0.5) / GAP_GRID_SIZE as f64 * 2.0 - 1.0;

                // Skip lattice corners outside the searched disc
                if (fx * fx + fy * fy).sqrt() > 1.0 {
                    continue;
                }

                let cell = match Coordinates::new(
                    center.latitude + fy * lat_step,
                    center.longitude + fx * lon_step,
                ) {
                    Some(cell) => cell,
                    None => continue,
                };

                let nearest_gym_distance_miles = gyms
                    .iter()
                    .map(|g| {
                        cell.haversine_distance_meters(&g.coordinates)
                            / crate::constants::METERS_PER_MILE
                    })
                    .fold(f64::INFINITY, f64::min);

                let population_density = population.density_at(&cell);

                let gap_score =
                    compute_gap_score(population_density, nearest_gym_distance_miles, radius_miles);

                if gap_score < GAP_SCORE_FLOOR {
                    continue;
                }

                let nearest = if nearest_gym_distance_miles.is_finite() {
                    nearest_gym_distance_miles
                } else {
                    radius_miles
                };

                gaps.push(MarketGap {
                    area_description: format!(
                        "Sub-region {:.4}, {:.4} near {}",
                        cell.latitude, cell.longitude, location
                    ),
                    coordinates: cell,
                    gap_score,
                    population_density,
                    nearest_gym_distance: nearest,
                    reasoning: format!(
                        "Population density ~{:.0}/sq mi with nearest gym {:.1} miles away",
                        population_density, nearest
                    ),
                });
            }
        }

        gaps.sort_by(|a, b| {
            b.gap_score
                .partial_cmp(&a.gap_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            "Market gap analysis for '{}' found {} underserved sub-regions",
            location,
            gaps.len()
        );
        Ok(gaps)
    }
}

/// Composite of normalized population density and normalized distance to
/// the nearest existing gym, each contributing half.
fn compute_gap_score(
    population_density: f64,
    nearest_gym_distance_miles: f64,
    radius_miles: f64,
) -> f64 {
    // 5000/sq mi is dense urban residential; saturate there
    let density_component = (population_density / 5000.0).min(1.0);

    let distance_component = if nearest_gym_distance_miles.is_finite() {
        (nearest_gym_distance_miles / radius_miles).min(1.0)
    } else {
        // No gym at all in range
        1.0
    };

    0.5 * density_component + 0.5 * distance_component
}

fn confidence_histogram(gyms: &[GymEntity]) -> HashMap<&'static str, usize> {
    let mut hist: HashMap<&'static str, usize> = HashMap::from([
        ("0.0-0.2", 0),
        ("0.2-0.4", 0),
        ("0.4-0.6", 0),
        ("0.6-0.8", 0),
        ("0.8-1.0", 0),
    ]);

    for gym in gyms {
        let bucket = match gym.confidence {
            c if c < 0.2 => "0.0-0.2",
            c if c < 0.4 => "0.2-0.4",
            c if c < 0.6 => "0.4-0.6",
            c if c < 0.8 => "0.6-0.8",
            _ => "0.8-1.0",
        };
        *hist.get_mut(bucket).unwrap() += 1;
    }

    hist
}

fn source_counts(gyms: &[GymEntity]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for gym in gyms {
        for source in &gym.sources {
            *counts.entry(source.provider_name.clone()).or_insert(0) += 1;
        }
    }
    counts
}

fn rating_stats(gyms: &[GymEntity]) -> serde_json::Value {
    let ratings: Vec<f64> = gyms.iter().filter_map(|g| g.rating).collect();

    if ratings.is_empty() {
        return json!({"count": 0, "average": 0.0, "min": 0.0, "max": 0.0});
    }

    json!({
        "count": ratings.len(),
        "average": ratings.iter().sum::<f64>() / ratings.len() as f64,
        "min": ratings.iter().cloned().fold(f64::INFINITY, f64::min),
        "max": ratings.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusteringConfig, ScoringPolicy};
    use crate::domain::SourceAttribution;
    use crate::storage::InMemoryStorage;
    use chrono::Utc;

    fn entity(name: &str, lat: f64, lon: f64, confidence: f64, rating: Option<f64>) -> GymEntity {
        GymEntity {
            id: None,
            name: name.to_string(),
            address: "addr".to_string(),
            coordinates: Coordinates::new(lat, lon).unwrap(),
            phone: None,
            website: None,
            instagram: None,
            rating,
            review_count: None,
            sources: vec![SourceAttribution {
                provider_name: "yelp".to_string(),
                per_source_confidence: confidence,
                last_updated: Utc::now(),
            }],
            confidence,
            match_confidence: 0.5,
            source_location: "austin, texas".to_string(),
            metropolitan_area_code: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn seeded_engine(entities: Vec<GymEntity>) -> AnalyticsEngine {
        let storage = Arc::new(InMemoryStorage::new(
            ScoringPolicy::default(),
            ClusteringConfig::default(),
        ));
        storage.upsert_entities(&entities).await.unwrap();
        AnalyticsEngine::new(storage)
    }

    #[tokio::test]
    async fn test_empty_area_analytics() {
        let engine = seeded_engine(vec![]).await;
        let center = Coordinates::new(30.2672, -97.7431).unwrap();

        let analytics = engine.analyze("Austin, TX", &center, 10.0).await.unwrap();
        assert_eq!(analytics.total_gyms, 0);
        assert_eq!(analytics.market_saturation, "low");
        assert_eq!(analytics.density_score, 0.0);
    }

    #[tokio::test]
    async fn test_analytics_aggregates() {
        let engine = seeded_engine(vec![
            entity("A Gym", 30.2672, -97.7431, 0.9, Some(4.0)),
            entity("B Gym", 30.2680, -97.7440, 0.5, Some(5.0)),
            entity("C Gym", 30.2690, -97.7450, 0.1, None),
        ])
        .await;
        let center = Coordinates::new(30.2672, -97.7431).unwrap();

        let analytics = engine.analyze("Austin, TX", &center, 10.0).await.unwrap();
        assert_eq!(analytics.total_gyms, 3);

        let hist: HashMap<String, usize> =
            serde_json::from_str(&analytics.confidence_distribution).unwrap();
        assert_eq!(hist["0.8-1.0"], 1);
        assert_eq!(hist["0.4-0.6"], 1);
        assert_eq!(hist["0.0-0.2"], 1);

        let ratings: serde_json::Value = serde_json::from_str(&analytics.rating_analysis).unwrap();
        assert_eq!(ratings["count"], 2);
        assert_eq!(ratings["average"], 4.5);

        let sources: HashMap<String, usize> =
            serde_json::from_str(&analytics.source_breakdown).unwrap();
        assert_eq!(sources["yelp"], 3);
    }

    #[tokio::test]
    async fn test_gap_analysis_scores_empty_area_high() {
        // No gyms at all: every in-disc cell is a candidate gap
        let engine = seeded_engine(vec![]).await;
        let center = Coordinates::new(30.2672, -97.7431).unwrap();
        let population = UniformPopulationModel {
            center,
            peak_density: 4000.0,
        };

        let gaps = engine
            .market_gap_analysis("Austin, TX", &center, 10.0, &population)
            .await
            .unwrap();

        assert!(!gaps.is_empty());
        assert!(gaps[0].gap_score >= gaps[gaps.len() - 1].gap_score);
        assert!(gaps.iter().all(|g| g.gap_score >= GAP_SCORE_FLOOR));
    }

    #[tokio::test]
    async fn test_gap_analysis_lower_near_existing_gyms() {
        let center = Coordinates::new(30.2672, -97.7431).unwrap();
        let population = UniformPopulationModel {
            center,
            peak_density: 4000.0,
        };

        let empty_engine = seeded_engine(vec![]).await;
        let empty_gaps = empty_engine
            .market_gap_analysis("Austin, TX", &center, 10.0, &population)
            .await
            .unwrap();

        // Saturate the area with gyms on the same lattice
        let mut gyms = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                gyms.push(entity(
                    &format!("Gym {}-{}", i, j),
                    30.2672 + (i as f64 - 1.5) * 0.06,
                    -97.7431 + (j as f64 - 1.5) * 0.06,
                    0.8,
                    None,
                ));
            }
        }
        let dense_engine = seeded_engine(gyms).await;
        let dense_gaps = dense_engine
            .market_gap_analysis("Austin, TX", &center, 10.0, &population)
            .await
            .unwrap();

        let empty_top = empty_gaps.first().map(|g| g.gap_score).unwrap_or(0.0);
        let dense_top = dense_gaps.first().map(|g| g.gap_score).unwrap_or(0.0);
        assert!(dense_top < empty_top);
    }
}
