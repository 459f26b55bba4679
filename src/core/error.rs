//! Error taxonomy for the request path

use std::time::Duration;

use serde::Serialize;

use crate::offload::OperationKind;

/// Errors surfaced by the session lifecycle, the worker pool and the adapter.
///
/// All of them are terminal for the request that hit them. The coordinator turns each one into
/// an error [`Response`](super::coordinator::Response).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("Chat session failed to initialize: {0}")]
    SessionInitFailed(String),

    #[error("Chat session not ready after {0:?}")]
    SessionTimeout(Duration),

    #[error("Chat session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Worker pool queue is full ({limit} items waiting)")]
    QueueFull { limit: usize },

    #[error("{kind} failed: {message}")]
    OperationFailed { kind: OperationKind, message: String },

    #[error("{kind} timed out after {after:?}")]
    OperationTimeout { kind: OperationKind, after: Duration },
}

/// Fieldless mirror of [`CoreError`], used on the wire and for status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SessionInitFailed,
    SessionTimeout,
    SessionUnavailable,
    PoolClosed,
    QueueFull,
    OperationFailed,
    OperationTimeout,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::SessionInitFailed(_) => ErrorKind::SessionInitFailed,
            CoreError::SessionTimeout(_) => ErrorKind::SessionTimeout,
            CoreError::SessionUnavailable(_) => ErrorKind::SessionUnavailable,
            CoreError::PoolClosed => ErrorKind::PoolClosed,
            CoreError::QueueFull { .. } => ErrorKind::QueueFull,
            CoreError::OperationFailed { .. } => ErrorKind::OperationFailed,
            CoreError::OperationTimeout { .. } => ErrorKind::OperationTimeout,
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SessionInitFailed => "session_init_failed",
            ErrorKind::SessionTimeout => "session_timeout",
            ErrorKind::SessionUnavailable => "session_unavailable",
            ErrorKind::PoolClosed => "pool_closed",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::OperationTimeout => "operation_timeout",
        }
    }
}
