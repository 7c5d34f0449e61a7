use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use baodao_common::TalkError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Core service error: {0}")]
    Core(#[from] TalkError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR"),
            ApiError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, msg, "AUTHENTICATION_ERROR")
            }
            ApiError::Authorization(msg) => (StatusCode::FORBIDDEN, msg, "AUTHORIZATION_ERROR"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::Core(err) => {
                error!("Core service error: {}", err);
                match err {
                    TalkError::Validation(msg) => {
                        (StatusCode::BAD_REQUEST, msg, "VALIDATION_ERROR")
                    }
                    TalkError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
                    TalkError::Unauthorized => (
                        StatusCode::UNAUTHORIZED,
                        "Unauthorized".to_string(),
                        "UNAUTHORIZED",
                    ),
                    TalkError::NoAvailableSlot => (
                        StatusCode::CONFLICT,
                        "No available slot".to_string(),
                        "NO_AVAILABLE_SLOT",
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        "INTERNAL_ERROR",
                    ),
                }
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let response_body = json!({
            "success": false,
            "error": error_message,
            "error_code": error_code,
            "timestamp": chrono::Utc::now()
        });

        (status, Json(response_body)).into_response()
    }
}

pub fn validation_error(message: &str) -> ApiError {
    ApiError::Validation(message.to_string())
}

pub fn auth_error(message: &str) -> ApiError {
    ApiError::Authentication(message.to_string())
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let response = validation_error("missing field").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_principal_maps_to_unauthorized() {
        let response = auth_error("missing bearer token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_taken_slot_maps_to_conflict() {
        let response = ApiError::from(TalkError::NoAvailableSlot).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
