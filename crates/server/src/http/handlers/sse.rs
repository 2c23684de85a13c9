use crate::http::error::ApiResult;
use crate::http::handlers::admin::authorize;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub project_id: Option<String>,
}

/// Live moderation events for the dashboard, optionally for one project.
pub async fn sse_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    authorize(&state, &headers)?;

    let rx = state.tx_events.subscribe();
    tracing::info!(project = ?query.project_id, "SSE connected");
    let wanted = query.project_id;
    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            if wanted
                .as_deref()
                .is_some_and(|p| p != event.project_id().as_str())
            {
                return None;
            }
            Some(
                Event::default()
                    .event(event.name())
                    .json_data(&event)
                    .map_err(|e| {
                        tracing::error!("SSE serialization error: {}", e);
                        axum::Error::new(e)
                    }),
            )
        }
        Err(_) => None,
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(15))))
}
