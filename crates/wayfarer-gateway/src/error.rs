use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use wayfarer_core::error::WayfarerError;

/// A failure detected before a response body starts streaming.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Core(WayfarerError),
}

impl From<WayfarerError> for ApiError {
    fn from(e: WayfarerError) -> Self {
        Self::Core(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Core(e) => match e {
                WayfarerError::ThreadNotFound(_) => StatusCode::NOT_FOUND,
                WayfarerError::ThreadBusy(_) | WayfarerError::CheckpointConflict { .. } => {
                    StatusCode::CONFLICT
                }
                WayfarerError::InvalidRequest(_) | WayfarerError::Json(_) => {
                    StatusCode::BAD_REQUEST
                }
                WayfarerError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unauthorized => "unauthorized".to_string(),
            Self::Core(e) => e.to_string(),
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (WayfarerError::ThreadNotFound("t".into()), 404),
            (WayfarerError::ThreadBusy("t".into()), 409),
            (WayfarerError::InvalidRequest("x".into()), 400),
            (WayfarerError::Database("locked".into()), 503),
            (WayfarerError::LlmRequest("down".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).status().as_u16(), code);
        }
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
