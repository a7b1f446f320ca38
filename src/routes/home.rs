use axum::{extract::State, response::Html, routing::get, Router};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use super::{current_session, render_full_page, session_cookie};
use crate::error::AppResult;
use crate::middleware::ClientAddr;
use crate::models::{AppState, Filter};

pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(home)).with_state(state)
}

/// GET / - full page with every job, issuing a session cookie when the
/// request has none or its session has expired. A returning session's
/// filter is cleared so the stream and the blank form agree.
async fn home(
    State(state): State<AppState>,
    client: ClientAddr,
    jar: CookieJar,
) -> AppResult<(CookieJar, Html<String>)> {
    let (jar, session) = match current_session(&state, &jar).await {
        Some(session) => {
            if !session.filter.is_empty() {
                state
                    .sessions
                    .update_filter(&session.id, Filter::default())
                    .await?;
            }
            (jar, session)
        }
        None => {
            let session = state.sessions.create().await;
            info!(session_id = %session.id, client = %client, "Issued new session");
            let cookie = session_cookie(&session.id, state.config.session.cookie_secure);
            (jar.add(cookie), session)
        }
    };

    let all: Vec<_> = state.jobs.jobs().iter().collect();
    let page = render_full_page(&state, &session, &Filter::default(), &all);
    Ok((jar, page))
}
