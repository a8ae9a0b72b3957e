//! Error types for sicop-api
//!
//! Every handler error is rendered as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Body is not a well-formed property description (422)
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Engine error; caller mistakes map to 400, everything else to 500
    #[error("{0}")]
    Common(#[from] sicop_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Common(sicop_common::Error::Schema(_)) => "SCHEMA_ERROR",
            ApiError::Common(sicop_common::Error::InvalidInput(_)) => "BAD_REQUEST",
            ApiError::Common(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let message = match &self {
            ApiError::BadRequest(msg) | ApiError::Unprocessable(msg) | ApiError::Internal(msg) => {
                msg.clone()
            }
            ApiError::Common(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sicop_common::Error;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(Error::Schema("comuna".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::InvalidInput("k".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::Internal("nan".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Unprocessable("bad json".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::from(Error::Schema("x".into())).code(), "SCHEMA_ERROR");
        assert_eq!(ApiError::from(Error::Model("x".into())).code(), "INTERNAL_ERROR");
        assert_eq!(ApiError::BadRequest("x".into()).code(), "BAD_REQUEST");
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::from(Error::InvalidInput("k must be positive".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
