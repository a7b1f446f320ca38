//! Search submissions
//!
//! The same endpoint serves both kinds of client:
//! - no scripting: a normal `<form>` post (or GET query string); the filter
//!   is stored and the whole page comes back re-rendered
//! - scripting: a JSON body; the filter is stored, the response is an empty
//!   204 and the results arrive over `/events`
//!
//! `tag` may be a single string or a list in either encoding.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, Form};
use serde::Deserialize;
use tracing::warn;

use super::{current_session, render_full_page};
use crate::csrf::{self, CSRF_HEADER};
use crate::error::{AppError, AppResult};
use crate::middleware::ClientAddr;
use crate::models::{AppState, Filter};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", any(search))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    Json,
    Form,
}

/// `tag` as sent by a script: absent, one value, or many.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagField {
    One(String),
    Many(Vec<String>),
}

/// Collapse the `tag` field into a list.
pub fn normalize_tags(tag: Option<TagField>) -> Vec<String> {
    match tag {
        None => Vec::new(),
        Some(TagField::One(tag)) => vec![tag],
        Some(TagField::Many(tags)) => tags,
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchJson {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    tag: Option<TagField>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchForm {
    #[serde(default)]
    q: String,
    #[serde(default)]
    tag: Vec<String>,
    #[serde(default, rename = "_csrf")]
    csrf: Option<String>,
}

/// A decoded search request.
#[derive(Debug, Clone)]
pub struct SearchSubmission {
    pub filter: Filter,
    pub mode: SubmissionMode,
    pub csrf_token: Option<String>,
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    Some(value.split(';').next()?.trim().to_ascii_lowercase())
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

impl<S> FromRequest<S> for SearchSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let media_type = media_type(req.headers());
        let header_token = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match media_type.as_deref() {
            Some(mt) if is_json(mt) => {
                let Json(body) = Json::<SearchJson>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.body_text()))?;
                Ok(Self {
                    filter: Filter::new(body.q.unwrap_or_default(), normalize_tags(body.tag)),
                    mode: SubmissionMode::Json,
                    csrf_token: header_token,
                })
            }
            Some(mt) if mt != "application/x-www-form-urlencoded" && !csrf::is_exempt(req.method()) => {
                Err(AppError::UnsupportedMediaType(mt.to_string()))
            }
            _ => {
                let Form(form) = Form::<SearchForm>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                Ok(Self {
                    filter: Filter::new(form.q, form.tag),
                    mode: SubmissionMode::Form,
                    csrf_token: form.csrf.or(header_token),
                })
            }
        }
    }
}

/// ANY /search
async fn search(
    State(state): State<AppState>,
    method: Method,
    client: ClientAddr,
    jar: CookieJar,
    submission: SearchSubmission,
) -> AppResult<Response> {
    let session = current_session(&state, &jar)
        .await
        .ok_or(AppError::MissingSession)?;

    if !csrf::is_exempt(&method)
        && !csrf::verify_token(&session.csrf_token, submission.csrf_token.as_deref())
    {
        warn!(session_id = %session.id, client = %client, "CSRF validation failed");
        return Err(AppError::InvalidCsrfToken);
    }

    state
        .sessions
        .update_filter(&session.id, submission.filter.clone())
        .await?;

    match submission.mode {
        SubmissionMode::Json => Ok(StatusCode::NO_CONTENT.into_response()),
        SubmissionMode::Form => {
            let subset = state.jobs.filter(&submission.filter);
            Ok(render_full_page(&state, &session, &submission.filter, &subset).into_response())
        }
    }
}
