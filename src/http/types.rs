//! Request and response bodies

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::core::{ErrorKind, Response};
use crate::pool::PoolStats;
use crate::session::LifecycleStatus;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "user_input")]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub session: LifecycleStatus,
    pub pool: PoolStats,
    /// Whether the transcript database answers; absent without a database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<bool>,
}

/// Boundary failure that never reached the coordinator (bad upload, unreadable body)
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            error: format!("Invalid request body: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self)).into_response()
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::SessionInitFailed
        | ErrorKind::SessionTimeout
        | ErrorKind::SessionUnavailable
        | ErrorKind::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::OperationTimeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status = self.error_kind().map(status_for).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_accepts_user_input_alias() {
        let request: ChatRequest = serde_json::from_str(r#"{"user_input": "hello"}"#).unwrap();
        assert_eq!(request.message, "hello");
    }

    #[test]
    fn queue_full_maps_to_too_many_requests() {
        assert_eq!(status_for(ErrorKind::QueueFull), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_for(ErrorKind::SessionUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
