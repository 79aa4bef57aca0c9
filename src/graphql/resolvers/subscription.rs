use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{Gym, SearchProgressEvent};
use async_graphql::futures_util::stream::{self, Stream};
use async_graphql::{Context, Result, Subscription, ID};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Root subscription object for GraphQL
pub struct Subscription;

#[Subscription]
impl Subscription {
    /// Ordered progress events for one search. The stream starts with the
    /// latest snapshot (so late subscribers catch up immediately) and ends
    /// after the terminal event.
    async fn search_progress(
        &self,
        ctx: &Context<'_>,
        search_id: ID,
    ) -> Result<impl Stream<Item = SearchProgressEvent>> {
        let context = ctx.data::<GraphQLContext>()?;
        let id = Uuid::parse_str(&search_id)?;

        let (snapshot, receiver) = context.search.progress().subscribe(id)?;

        Ok(stream::unfold(
            ProgressStreamState {
                pending: Some(snapshot),
                receiver,
                done: false,
            },
            |mut state| async move {
                if state.done {
                    return None;
                }

                if let Some(snapshot) = state.pending.take() {
                    state.done = snapshot.status.is_terminal();
                    return Some((SearchProgressEvent::from(snapshot), state));
                }

                loop {
                    match state.receiver.recv().await {
                        Ok(event) => {
                            state.done = event.status.is_terminal();
                            return Some((SearchProgressEvent::from(event), state));
                        }
                        // A lagged subscriber lost old events; newer ones
                        // carry the catch-up state
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        ))
    }

    /// Refreshed gym entities for a location, emitted as searches persist
    /// new or updated data. Takes the same free-text input as searches, so
    /// "Austin, TX" and "austin texas" share one stream.
    async fn gym_updates(
        &self,
        ctx: &Context<'_>,
        location: String,
    ) -> Result<impl Stream<Item = Gym>> {
        let context = ctx.data::<GraphQLContext>()?;
        let resolved = context.search.resolve_location(&location).await?;
        let receiver = context
            .search
            .storage()
            .subscribe_updates(&resolved.location_key);

        Ok(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(entity) => return Some((Gym::from(entity), receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

struct ProgressStreamState {
    pending: Option<crate::domain::SearchProgress>,
    receiver: broadcast::Receiver<crate::domain::SearchProgress>,
    done: bool,
}
