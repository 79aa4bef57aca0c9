use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::SearchProgressEvent;
use async_graphql::{Context, FieldResult, Object, ID};
use uuid::Uuid;

/// Root mutation object for GraphQL
pub struct Mutation;

#[Object]
impl Mutation {
    /// Start a background gym search and return its initial progress
    /// snapshot. Subscribe to `searchProgress` with the returned id to
    /// follow the pipeline.
    async fn trigger_gym_search(
        &self,
        ctx: &Context<'_>,
        location: String,
        radius_miles: Option<f64>,
        force_refresh: Option<bool>,
    ) -> FieldResult<SearchProgressEvent> {
        let context = ctx.data::<GraphQLContext>()?;

        let search_id =
            context
                .search
                .trigger_search(location, radius_miles, force_refresh.unwrap_or(false));

        let snapshot = context
            .search
            .progress()
            .get_search_status(search_id)
            .ok_or("search was created but has no progress state")?;
        Ok(snapshot.into())
    }

    /// Cancel a running search. Returns false when the search is unknown
    /// or already finished.
    async fn cancel_search(&self, ctx: &Context<'_>, search_id: ID) -> FieldResult<bool> {
        let context = ctx.data::<GraphQLContext>()?;
        let id = Uuid::parse_str(&search_id)?;
        Ok(context.search.cancel_search(id))
    }
}
