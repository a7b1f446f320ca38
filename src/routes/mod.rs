//! HTTP Routes
//!
//! - `/` - Full page, issues the session cookie
//! - `/search` - Form or JSON search submission
//! - `/events` - Server-sent results stream for the session
//! - `/health` - Health check
//! - everything else - Static assets (`/style.css`, `/app.js`)

pub mod events;
pub mod health;
pub mod home;
pub mod search;
pub mod static_files;

use axum::{middleware::from_fn_with_state, response::Html, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::jobs::Job;
use crate::middleware::{apply_security_headers, rate_limiter_middleware};
use crate::models::{AppState, Filter};
use crate::render::{self, PageContext};
use crate::sessions::Session;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let app = Router::new()
        .merge(home::router(state.clone()))
        .merge(search::router(state.clone()))
        .merge(events::router(state.clone()))
        .merge(health::router(state.clone()))
        .merge(static_files::router(&state.config.server.static_dir))
        .layer(from_fn_with_state(state, rate_limiter_middleware))
        .layer(TraceLayer::new_for_http());

    apply_security_headers(app)
}

/// Http-only, same-site-strict session cookie.
pub fn session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// The live session named by the request's cookie, if any.
pub async fn current_session(state: &AppState, jar: &CookieJar) -> Option<Session> {
    let id = jar.get(SESSION_COOKIE)?.value().to_string();
    state.sessions.fetch(&id).await
}

pub(crate) fn render_full_page(
    state: &AppState,
    session: &Session,
    filter: &Filter,
    jobs: &[&Job],
) -> Html<String> {
    let ctx = PageContext {
        query: &filter.query,
        selected_tags: &filter.tags,
        tag_match: state.jobs.tag_match(),
        tags: state.jobs.tags(),
        csrf_token: &session.csrf_token,
        assets: &state.assets,
    };
    Html(render::render_page(&render::render_list(jobs), &ctx))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::middleware::build_rate_limiter;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, Method, Request, StatusCode},
    };
    use futures::StreamExt;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn test_session_cookie_flags() {
        let cookie = session_cookie("abc", true).to_string();
        assert!(cookie.starts_with("sid=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));

        assert!(!session_cookie("abc", false).to_string().contains("Secure"));
    }

    #[tokio::test]
    async fn test_full_flow_home_search_events() {
        let state = test_state();
        let app = create_router(state.clone());

        // 1. Home page issues a session.
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let sid = session_id_from(&response).expect("session cookie");
        let page = body_text(response).await;
        assert!(page.contains(r#"<p id="count" aria-live="polite">10 jobs</p>"#));

        let token = state.sessions.fetch(&sid).await.unwrap().csrf_token;
        assert!(page.contains(&token));

        // 2. Stream attaches and reports the unfiltered list.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/events")
                    .header(header::COOKIE, format!("sid={sid}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        let mut body = response.into_body().into_data_stream();
        let first = String::from_utf8(body.next().await.unwrap().unwrap().to_vec()).unwrap();
        assert!(first.contains("event: results"));
        assert!(first.contains(r#""count":10"#));

        // 3. JSON search answers 204 and pushes new results down the stream.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/search")
                    .header(header::COOKIE, format!("sid={sid}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-csrf-token", &token)
                    .body(Body::from(r#"{"q":"engineer","tag":"Full-Time"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_text(response).await.is_empty());

        let update = String::from_utf8(body.next().await.unwrap().unwrap().to_vec()).unwrap();
        assert!(update.contains("event: results"));
        assert!(update.contains(r#""count":3"#));
    }

    #[tokio::test]
    async fn test_stale_cookie_gets_new_session() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, "sid=not-a-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let sid = session_id_from(&response).expect("fresh cookie");
        assert_ne!(sid, "not-a-session");
        assert!(state.sessions.fetch(&sid).await.is_some());
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }

    fn health_from(peer: [u8; 4], forwarded: &str) -> Request<Body> {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", forwarded)
            .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let mut state = test_state();
        state.rate_limiter = Arc::new(build_rate_limiter(1));
        let app = create_router(state);

        let request = || health_from([198, 51, 100, 4], "198.51.100.4");
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.oneshot(request()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_shares_peer_bucket() {
        let mut state = test_state();
        state.rate_limiter = Arc::new(build_rate_limiter(1));
        let app = create_router(state.clone());

        let mut statuses = Vec::new();
        for i in 0..5 {
            let request = Request::builder()
                .uri("/")
                .header("x-forwarded-for", format!("10.0.0.{i}"))
                .extension(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 40000))))
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_trusted_proxy_keys_on_forwarded_for() {
        let mut state = test_state();
        state.config.server.trust_proxy = true;
        state.rate_limiter = Arc::new(build_rate_limiter(1));
        let app = create_router(state);

        let proxy = [10, 1, 1, 1];
        assert_eq!(
            app.clone().oneshot(health_from(proxy, "203.0.113.1")).await.unwrap().status(),
            StatusCode::OK
        );
        assert_eq!(
            app.clone().oneshot(health_from(proxy, "203.0.113.2")).await.unwrap().status(),
            StatusCode::OK
        );
        assert_eq!(
            app.oneshot(health_from(proxy, "203.0.113.1")).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
