//! API error handling and response types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use streamarr_core::StreamarrError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] StreamarrError),

    #[error("Bad request: {message}")]
    BadRequest { message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            ApiError::Core(core) => match core {
                StreamarrError::InvalidRequest { message } => {
                    (StatusCode::BAD_REQUEST, message)
                }
                StreamarrError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, "API key rejected".to_string())
                }
                StreamarrError::ServiceBusy { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable. Please try again.".to_string(),
                ),
                other => {
                    tracing::error!("internal error: {other}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An error occurred while processing the request.".to_string(),
                    )
                }
            },
        };
        let body = Json(json!({
            "error": {
                "message": message,
                "code": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ApiError::Core(StreamarrError::InvalidRequest {
                message: "bad".to_string()
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Core(StreamarrError::Unauthorized)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Core(StreamarrError::ServiceBusy {
                operation: "search".to_string()
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ApiError::Core(StreamarrError::Internal {
                message: "boom".to_string()
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
