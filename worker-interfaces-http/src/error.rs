use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status_code, status, error) = match self {
            HttpError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "degraded", message)
            }
            HttpError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "error", message),
        };
        (status_code, Json(ErrorBody { status, error })).into_response()
    }
}
