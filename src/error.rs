use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::sessions::SessionError;

/// Request-level failures. Each maps to a client error status and none of
/// them affect other sessions.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad session")]
    MissingSession,

    #[error("Invalid CSRF token")]
    InvalidCsrfToken,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Too many requests")]
    RateLimited,
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::MissingSession,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingSession | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCsrfToken => StatusCode::FORBIDDEN,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = %status, error = %self, "Request rejected");
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingSession.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCsrfToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::UnsupportedMediaType("text/plain".into()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn test_session_error_becomes_bad_session() {
        let err: AppError = SessionError::NotFound("abc".into()).into();
        assert!(matches!(err, AppError::MissingSession));
        assert_eq!(err.to_string(), "Bad session");
    }
}
