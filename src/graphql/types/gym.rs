use crate::domain::{GymEntity, SourceAttribution};
use async_graphql::{Object, ID};

/// GraphQL representation of a canonical gym entity
#[derive(Clone)]
pub struct Gym {
    pub inner: GymEntity,
}

impl From<GymEntity> for Gym {
    fn from(entity: GymEntity) -> Self {
        Self { inner: entity }
    }
}

#[Object]
impl Gym {
    /// The unique identifier for the gym
    async fn id(&self) -> ID {
        ID(self.inner.id.unwrap_or_default().to_string())
    }

    /// The gym's name
    async fn name(&self) -> &str {
        &self.inner.name
    }

    /// The gym's street address
    async fn address(&self) -> &str {
        &self.inner.address
    }

    /// The gym's latitude coordinate
    async fn latitude(&self) -> f64 {
        self.inner.coordinates.latitude
    }

    /// The gym's longitude coordinate
    async fn longitude(&self) -> f64 {
        self.inner.coordinates.longitude
    }

    /// The gym's phone number
    async fn phone(&self) -> Option<&str> {
        self.inner.phone.as_deref()
    }

    /// The gym's website URL
    async fn website(&self) -> Option<&str> {
        self.inner.website.as_deref()
    }

    /// The gym's Instagram handle
    async fn instagram(&self) -> Option<&str> {
        self.inner.instagram.as_deref()
    }

    /// Average rating across contributing sources
    async fn rating(&self) -> Option<f64> {
        self.inner.rating
    }

    /// Number of reviews backing the rating
    async fn review_count(&self) -> Option<i32> {
        self.inner.review_count
    }

    /// Canonical confidence that this entity is a real, correctly merged gym
    async fn confidence(&self) -> f64 {
        self.inner.confidence
    }

    /// How strongly the contributing listings matched each other
    async fn match_confidence(&self) -> f64 {
        self.inner.match_confidence
    }

    /// The data sources that contributed to this entity
    async fn sources(&self) -> Vec<GymSource> {
        self.inner.sources.iter().cloned().map(GymSource::from).collect()
    }

    /// Location key of the search that produced or last refreshed this entity
    async fn source_location(&self) -> &str {
        &self.inner.source_location
    }

    /// Metropolitan area code, when known
    async fn metropolitan_area_code(&self) -> Option<&str> {
        self.inner.metropolitan_area_code.as_deref()
    }

    /// When the entity was first created
    async fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.created_at
    }

    /// When the entity was last refreshed
    async fn updated_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.updated_at
    }
}

/// One provider's contribution to a gym entity
#[derive(Clone)]
pub struct GymSource {
    inner: SourceAttribution,
}

impl From<SourceAttribution> for GymSource {
    fn from(attribution: SourceAttribution) -> Self {
        Self { inner: attribution }
    }
}

#[Object]
impl GymSource {
    /// The provider that contributed this attribution
    async fn provider(&self) -> &str {
        &self.inner.provider_name
    }

    /// The provider's per-source confidence for this entity
    async fn confidence(&self) -> f64 {
        self.inner.per_source_confidence
    }

    /// When this provider's data was last refreshed
    async fn last_updated(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.last_updated
    }
}
