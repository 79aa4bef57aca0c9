use crate::config::{ClusteringConfig, ScoringPolicy};
use crate::domain::{GymEntity, UpsertReport};
use crate::error::Result;
use crate::reconcile::{combine_confidence, normalize_name};
use crate::types::Coordinates;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Storage trait for persisting canonical gym entities.
///
/// All writes go through `upsert_entities`, which serializes concurrent
/// upserts so overlapping searches cannot lose updates.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upsert canonical entities. The upsert key is normalized name plus
    /// proximity, not raw ID. Idempotent: re-applying identical input
    /// produces no additional changes.
    async fn upsert_entities(&self, entities: &[GymEntity]) -> Result<UpsertReport>;

    async fn get_gym_by_id(&self, id: Uuid) -> Result<Option<GymEntity>>;

    /// All entities tagged with a location key
    async fn get_gyms_by_location_key(&self, location_key: &str) -> Result<Vec<GymEntity>>;

    /// All entities within a radius of a point
    async fn get_gyms_in_radius(
        &self,
        center: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<GymEntity>>;

    /// Stream of refreshed entities for a location key
    fn subscribe_updates(&self, location_key: &str) -> broadcast::Receiver<GymEntity>;
}

/// In-memory storage implementation for development/testing.
/// A production deployment would swap this for a PostGIS-backed store.
pub struct InMemoryStorage {
    // Single lock over the entity map stands in for row-level locking:
    // concurrent upserts targeting the same entity are serialized.
    gyms: Mutex<HashMap<Uuid, GymEntity>>,
    update_channels: Mutex<HashMap<String, broadcast::Sender<GymEntity>>>,
    scoring: ScoringPolicy,
    clustering: ClusteringConfig,
}

impl InMemoryStorage {
    pub fn new(scoring: ScoringPolicy, clustering: ClusteringConfig) -> Self {
        Self {
            gyms: Mutex::new(HashMap::new()),
            update_channels: Mutex::new(HashMap::new()),
            scoring,
            clustering,
        }
    }

    fn notify_update(&self, entity: &GymEntity) {
        let channels = self.update_channels.lock().unwrap();
        if let Some(sender) = channels.get(&entity.source_location) {
            // Nobody listening is fine
            let _ = sender.send(entity.clone());
        }
    }

    /// Find an already-persisted entity matching by normalized name and
    /// proximity. Canonical IDs are assigned internally, so identity is
    /// established by these heuristics rather than raw ID.
    fn find_match(
        gyms: &HashMap<Uuid, GymEntity>,
        incoming: &GymEntity,
        max_distance_meters: f64,
    ) -> Option<Uuid> {
        let incoming_name = normalize_name(&incoming.name);
        gyms.values()
            .find(|existing| {
                normalize_name(&existing.name) == incoming_name
                    && existing
                        .coordinates
                        .haversine_distance_meters(&incoming.coordinates)
                        <= max_distance_meters
            })
            .and_then(|e| e.id)
    }

    /// Merge an incoming entity into an existing one: per-provider source
    /// entries are replaced (never duplicated), gaps fill from the incoming
    /// record, and confidence is recomputed from the merged sources.
    /// Returns true when anything actually changed.
    fn merge_into(existing: &mut GymEntity, incoming: &GymEntity, scoring: &ScoringPolicy) -> bool {
        let mut changed = false;

        for source in &incoming.sources {
            match existing
                .sources
                .iter_mut()
                .find(|s| s.provider_name == source.provider_name)
            {
                Some(stale) => {
                    if (stale.per_source_confidence - source.per_source_confidence).abs() > f64::EPSILON {
                        stale.per_source_confidence = source.per_source_confidence;
                        changed = true;
                    }
                    // A re-fetch refreshes the attribution timestamp even
                    // when the data itself did not change
                    stale.last_updated = source.last_updated;
                }
                None => {
                    existing.sources.push(source.clone());
                    changed = true;
                }
            }
        }

        if existing.phone.is_none() && incoming.phone.is_some() {
            existing.phone = incoming.phone.clone();
            changed = true;
        }
        if existing.website.is_none() && incoming.website.is_some() {
            existing.website = incoming.website.clone();
            changed = true;
        }
        if existing.instagram.is_none() && incoming.instagram.is_some() {
            existing.instagram = incoming.instagram.clone();
            changed = true;
        }
        if incoming.rating.is_some() && existing.rating != incoming.rating {
            existing.rating = incoming.rating;
            changed = true;
        }
        if incoming.review_count.is_some() && existing.review_count != incoming.review_count {
            existing.review_count = incoming.review_count;
            changed = true;
        }
        if existing.match_confidence < incoming.match_confidence {
            existing.match_confidence = incoming.match_confidence;
            changed = true;
        }

        if changed {
            existing.confidence = combine_confidence(&existing.sources, scoring);
        }
        // Re-applying identical data is not a change, but it still counts
        // as a refresh for freshness tracking
        existing.updated_at = Utc::now();

        changed
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_entities(&self, entities: &[GymEntity]) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();
        let mut updated_entities = Vec::new();

        {
            let mut gyms = self.gyms.lock().unwrap();

            for incoming in entities {
                match Self::find_match(&gyms, incoming, self.clustering.upsert_match_distance_meters)
                {
                    Some(existing_id) => {
                        if let Some(existing) = gyms.get_mut(&existing_id) {
                            if Self::merge_into(existing, incoming, &self.scoring) {
                                report.updated += 1;
                                updated_entities.push(existing.clone());
                                debug!("Updated gym: {} with id {}", existing.name, existing_id);
                            }
                        }
                    }
                    None => {
                        let id = Uuid::new_v4();
                        let mut entity = incoming.clone();
                        entity.id = Some(id);
                        entity.confidence = combine_confidence(&entity.sources, &self.scoring);
                        gyms.insert(id, entity.clone());
                        report.created += 1;
                        updated_entities.push(entity);
                        debug!("Created gym: {} with id {}", incoming.name, id);
                    }
                }
            }
        }

        for entity in &updated_entities {
            self.notify_update(entity);
        }

        Ok(report)
    }

    async fn get_gym_by_id(&self, id: Uuid) -> Result<Option<GymEntity>> {
        let gyms = self.gyms.lock().unwrap();
        Ok(gyms.get(&id).cloned())
    }

    async fn get_gyms_by_location_key(&self, location_key: &str) -> Result<Vec<GymEntity>> {
        let gyms = self.gyms.lock().unwrap();
        let mut result: Vec<GymEntity> = gyms
            .values()
            .filter(|g| g.source_location == location_key)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(result)
    }

    async fn get_gyms_in_radius(
        &self,
        center: &Coordinates,
        radius_miles: f64,
    ) -> Result<Vec<GymEntity>> {
        let radius_meters = radius_miles * crate::constants::METERS_PER_MILE;
        let gyms = self.gyms.lock().unwrap();
        let mut result: Vec<GymEntity> = gyms
            .values()
            .filter(|g| center.haversine_distance_meters(&g.coordinates) <= radius_meters)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            let da = center.haversine_distance_meters(&a.coordinates);
            let db = center.haversine_distance_meters(&b.coordinates);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(result)
    }

    fn subscribe_updates(&self, location_key: &str) -> broadcast::Receiver<GymEntity> {
        let mut channels = self.update_channels.lock().unwrap();
        channels
            .entry(location_key.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe()
    }
}
