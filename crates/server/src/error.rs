use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use event_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown resource; the message is returned to the client verbatim
    #[error("{0}")]
    NotFound(&'static str),

    #[error("invalid payload: {}", .0.join("; "))]
    InvalidPayload(Vec<String>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            issues: None,
        }
    }

    fn invalid(issues: Vec<String>) -> Self {
        Self {
            error: "Invalid payload".to_string(),
            issues: Some(issues),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, ErrorResponse::message(message)),
            ApiError::InvalidPayload(issues)
            | ApiError::Store(StoreError::InvalidRegistration(issues)) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::invalid(issues))
            }
            ApiError::Store(StoreError::EventNotFound(_)) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::message("Event not found"),
            ),
            ApiError::Store(e) => {
                error!("Store failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::message("Internal server error"),
                )
            }
            ApiError::Internal(message) => {
                error!("Internal failure: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::message("Internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::NotFound("Not found"), StatusCode::NOT_FOUND),
            (ApiError::InvalidPayload(vec!["x".into()]), StatusCode::BAD_REQUEST),
            (
                ApiError::Store(StoreError::EventNotFound("e1".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Store(StoreError::InvalidRegistration(vec!["name".into()])),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
