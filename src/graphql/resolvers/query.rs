use crate::analytics::UniformPopulationModel;
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{
    Gym, GymAnalytics, MarketGap, SearchFiltersInput, SearchProgressEvent, SearchResult,
};
use async_graphql::{Context, FieldResult, Object, ID};
use uuid::Uuid;

/// Baseline residents per square mile assumed by the default population
/// model when no census data is wired up.
const DEFAULT_PEAK_DENSITY: f64 = 4000.0;

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
    /// Search for gyms around a location, reconciling all data providers.
    /// Serves persisted data when it is fresh enough.
    async fn search_gyms(
        &self,
        ctx: &Context<'_>,
        location: String,
        radius_miles: Option<f64>,
        limit: Option<i32>,
        filters: Option<SearchFiltersInput>,
        force_refresh: Option<bool>,
    ) -> FieldResult<SearchResult> {
        let context = ctx.data::<GraphQLContext>()?;
        let mut filters: crate::search::SearchFilters = filters.unwrap_or_default().into();
        // An explicit filters.maxResults wins over the shorthand limit
        if filters.max_results.is_none() {
            filters.max_results = limit.map(|l| l.max(0) as usize);
        }

        let result = context
            .search
            .search_gyms(
                &location,
                radius_miles,
                &filters,
                force_refresh.unwrap_or(false),
            )
            .await?;
        Ok(result.into())
    }

    /// Get a gym by ID
    async fn gym(&self, ctx: &Context<'_>, id: ID) -> FieldResult<Option<Gym>> {
        let context = ctx.data::<GraphQLContext>()?;
        let gym_id = Uuid::parse_str(&id)?;

        match context.search.storage().get_gym_by_id(gym_id).await {
            Ok(gym) => Ok(gym.map(|g| g.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// All persisted gyms for a normalized location key
    async fn gyms_by_location(
        &self,
        ctx: &Context<'_>,
        location_key: String,
    ) -> FieldResult<Vec<Gym>> {
        let context = ctx.data::<GraphQLContext>()?;

        match context
            .search
            .storage()
            .get_gyms_by_location_key(&location_key)
            .await
        {
            Ok(gyms) => Ok(gyms.into_iter().map(|g| g.into()).collect()),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest progress snapshot for a triggered search
    async fn search_status(
        &self,
        ctx: &Context<'_>,
        search_id: ID,
    ) -> FieldResult<Option<SearchProgressEvent>> {
        let context = ctx.data::<GraphQLContext>()?;
        let id = Uuid::parse_str(&search_id)?;
        Ok(context
            .search
            .progress()
            .get_search_status(id)
            .map(|p| p.into()))
    }

    /// Aggregate statistics for gyms around a location
    async fn gym_analytics(
        &self,
        ctx: &Context<'_>,
        location: String,
        radius_miles: Option<f64>,
    ) -> FieldResult<GymAnalytics> {
        let context = ctx.data::<GraphQLContext>()?;
        let radius = radius_miles.unwrap_or(context.search.config().default_radius_miles);

        let resolved = context.search.resolve_location(&location).await?;
        let analytics = context
            .analytics
            .analyze(&location, &resolved.coordinates, radius)
            .await?;
        Ok(analytics.into())
    }

    /// Underserved sub-regions around a location, best opportunities first
    async fn market_gap_analysis(
        &self,
        ctx: &Context<'_>,
        location: String,
        radius_miles: Option<f64>,
    ) -> FieldResult<Vec<MarketGap>> {
        let context = ctx.data::<GraphQLContext>()?;
        let radius = radius_miles.unwrap_or(context.search.config().default_radius_miles);

        let resolved = context.search.resolve_location(&location).await?;
        let population = UniformPopulationModel {
            center: resolved.coordinates,
            peak_density: DEFAULT_PEAK_DENSITY,
        };

        let gaps = context
            .analytics
            .market_gap_analysis(&location, &resolved.coordinates, radius, &population)
            .await?;
        Ok(gaps.into_iter().map(|g| g.into()).collect())
    }

    /// Stable names of the configured data providers
    async fn supported_providers(&self) -> Vec<String> {
        crate::constants::get_supported_providers()
            .into_iter()
            .map(String::from)
            .collect()
    }
}
