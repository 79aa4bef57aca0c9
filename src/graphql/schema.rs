use crate::analytics::AnalyticsEngine;
use crate::graphql::resolvers::{Mutation, Query, Subscription};
use crate::search::SearchService;
use async_graphql::Schema;
use std::sync::Arc;

/// GraphQL context containing shared application state
pub struct GraphQLContext {
    pub search: Arc<SearchService>,
    pub analytics: Arc<AnalyticsEngine>,
}

/// The complete GraphQL schema
pub type GraphQLSchema = Schema<Query, Mutation, Subscription>;

/// Create a new GraphQL schema with the given services
pub fn create_schema(
    search: Arc<SearchService>,
    analytics: Arc<AnalyticsEngine>,
) -> GraphQLSchema {
    Schema::build(Query, Mutation, Subscription)
        .data(GraphQLContext { search, analytics })
        .finish()
}
