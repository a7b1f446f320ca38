use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use futures::{Stream, StreamExt};
use tracing::info;

use super::current_session;
use crate::error::{AppError, AppResult};
use crate::middleware::ClientAddr;
use crate::models::AppState;
use crate::push::{self, PushEvent};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(events))
        .with_state(state)
}

fn to_sse_event(event: PushEvent) -> Event {
    let name = event.name();
    match event {
        PushEvent::Results(payload) => {
            let json = serde_json::to_string(&payload).unwrap_or_default();
            Event::default().event(name).data(json)
        }
        PushEvent::Ping => Event::default().event(name).data("ping"),
    }
}

/// GET /events - SSE stream of result sets for the caller's session.
async fn events(
    State(state): State<AppState>,
    client: ClientAddr,
    jar: CookieJar,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session = current_session(&state, &jar)
        .await
        .ok_or(AppError::MissingSession)?;

    let stream = push::subscribe(
        state.sessions.clone(),
        state.jobs.clone(),
        &session.id,
        state.config.session.keep_alive(),
    )
    .await?;
    info!(session_id = %session.id, client = %client, "Event stream opened");

    Ok(Sse::new(
        stream.map(|event| Ok::<_, Infallible>(to_sse_event(event))),
    ))
}
