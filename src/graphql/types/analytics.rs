use crate::domain;
use async_graphql::Object;

/// Aggregate statistics for gyms in an area
#[derive(Clone)]
pub struct GymAnalytics {
    pub inner: domain::GymAnalytics,
}

impl From<domain::GymAnalytics> for GymAnalytics {
    fn from(analytics: domain::GymAnalytics) -> Self {
        Self { inner: analytics }
    }
}

#[Object]
impl GymAnalytics {
    /// The analyzed location as given by the caller
    async fn location(&self) -> &str {
        &self.inner.location
    }

    /// Number of gyms in the analyzed area
    async fn total_gyms(&self) -> i32 {
        self.inner.total_gyms as i32
    }

    /// JSON histogram of confidence buckets
    async fn confidence_distribution(&self) -> &str {
        &self.inner.confidence_distribution
    }

    /// JSON map of provider name to contributing entity count
    async fn source_breakdown(&self) -> &str {
        &self.inner.source_breakdown
    }

    /// JSON rating statistics: count, average, min, max
    async fn rating_analysis(&self) -> &str {
        &self.inner.rating_analysis
    }

    /// Gyms per square mile of the analyzed disc
    async fn density_score(&self) -> f64 {
        self.inner.density_score
    }

    /// Market saturation tier: low, medium, or high
    async fn market_saturation(&self) -> &str {
        &self.inner.market_saturation
    }
}

/// A sub-region scored by estimated unmet demand for gyms
#[derive(Clone)]
pub struct MarketGap {
    pub inner: domain::MarketGap,
}

impl From<domain::MarketGap> for MarketGap {
    fn from(gap: domain::MarketGap) -> Self {
        Self { inner: gap }
    }
}

#[Object]
impl MarketGap {
    /// Human-readable description of the sub-region
    async fn area_description(&self) -> &str {
        &self.inner.area_description
    }

    /// Latitude of the sub-region center
    async fn latitude(&self) -> f64 {
        self.inner.coordinates.latitude
    }

    /// Longitude of the sub-region center
    async fn longitude(&self) -> f64 {
        self.inner.coordinates.longitude
    }

    /// Composite gap score; higher means more underserved
    async fn gap_score(&self) -> f64 {
        self.inner.gap_score
    }

    /// Estimated residents per square mile
    async fn population_density(&self) -> f64 {
        self.inner.population_density
    }

    /// Miles to the nearest known gym
    async fn nearest_gym_distance(&self) -> f64 {
        self.inner.nearest_gym_distance
    }

    /// Why this sub-region scored the way it did
    async fn reasoning(&self) -> &str {
        &self.inner.reasoning
    }
}
