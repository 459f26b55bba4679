//! Blocking call adapter
//!
//! Packages chat turns, file extraction and transcription as work items for the
//! [`WorkerPool`] and suspends the caller until the item resolves.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::extract::FileExtractor;
use super::transcribe::Transcriber;
use crate::core::{CoreError, RequestPhase};
use crate::pool::{PoolError, WorkHandle, WorkerPool};
use crate::session::{ChatSession, SessionLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ChatTurn,
    FileExtract,
    Transcribe,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ChatTurn => "chat_turn",
            OperationKind::FileExtract => "file_extract",
            OperationKind::Transcribe => "transcribe",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::ChatTurn => "Chat turn",
            OperationKind::FileExtract => "File extraction",
            OperationKind::Transcribe => "Transcription",
        };
        f.write_str(label)
    }
}

/// A blocking operation with its payload
#[derive(Debug, Clone)]
pub enum Operation {
    ChatTurn(String),
    FileExtract(PathBuf),
    Transcribe(PathBuf),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::ChatTurn(_) => OperationKind::ChatTurn,
            Operation::FileExtract(_) => OperationKind::FileExtract,
            Operation::Transcribe(_) => OperationKind::Transcribe,
        }
    }
}

/// Routes operations to the worker pool
#[derive(Clone)]
pub struct BlockingCallAdapter {
    pool: Arc<WorkerPool>,
    lifecycle: SessionLifecycle,
    extractor: Arc<dyn FileExtractor>,
    transcriber: Arc<dyn Transcriber>,
    ready_timeout: Duration,
    operation_timeout: Option<Duration>,
}

impl BlockingCallAdapter {
    pub fn new(
        pool: Arc<WorkerPool>,
        lifecycle: SessionLifecycle,
        extractor: Arc<dyn FileExtractor>,
        transcriber: Arc<dyn Transcriber>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            lifecycle,
            extractor,
            transcriber,
            ready_timeout,
            operation_timeout: None,
        }
    }

    /// Bound how long a caller waits for a submitted item. The item keeps its slot until the
    /// blocking call returns.
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// Run an operation on the pool and wait for its result.
    ///
    /// Chat turns wait for the session first; a failed session is reported as
    /// `SessionUnavailable` before anything is submitted.
    pub async fn run(&self, operation: Operation) -> Result<String, CoreError> {
        let kind = operation.kind();

        let handle = match operation {
            Operation::ChatTurn(text) => {
                let session = self.session().await?;
                self.submit(kind, move || session.chat(&text))?
            }
            Operation::FileExtract(path) => {
                let extractor = self.extractor.clone();
                self.submit(kind, move || extractor.extract(&path))?
            }
            Operation::Transcribe(path) => {
                let transcriber = self.transcriber.clone();
                self.submit(kind, move || transcriber.transcribe(&path))?
            }
        };

        debug!(
            operation = kind.as_str(),
            phase = RequestPhase::Queued.as_str(),
            "Work item queued"
        );
        self.wait(kind, handle).await
    }

    /// Wait for the shared chat session. A failed lifecycle is reported as `SessionUnavailable`.
    pub async fn session(&self) -> Result<Arc<dyn ChatSession>, CoreError> {
        match self.lifecycle.await_ready(self.ready_timeout).await {
            Ok(session) => Ok(session),
            Err(CoreError::SessionInitFailed(reason)) => Err(CoreError::SessionUnavailable(reason)),
            Err(e) => Err(e),
        }
    }

    fn submit<F>(&self, kind: OperationKind, work: F) -> Result<WorkHandle<String>, CoreError>
    where
        F: FnOnce() -> anyhow::Result<String> + Send + 'static,
    {
        self.pool
            .submit(work)
            .map_err(|e| map_pool_error(kind, e))
    }

    async fn wait(
        &self,
        kind: OperationKind,
        handle: WorkHandle<String>,
    ) -> Result<String, CoreError> {
        let outcome = match self.operation_timeout {
            Some(after) => match tokio::time::timeout(after, handle).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(CoreError::OperationTimeout { kind, after }),
            },
            None => handle.await,
        };

        outcome.map_err(|e| map_pool_error(kind, e))
    }
}

fn map_pool_error(kind: OperationKind, error: PoolError) -> CoreError {
    match error {
        PoolError::Closed => CoreError::PoolClosed,
        PoolError::QueueFull { limit } => CoreError::QueueFull { limit },
        PoolError::Failed(e) => CoreError::OperationFailed {
            kind,
            message: format!("{:#}", e),
        },
        PoolError::Panicked(message) => CoreError::OperationFailed {
            kind,
            message: format!("worker panicked: {}", message),
        },
        other @ PoolError::Abandoned => CoreError::OperationFailed {
            kind,
            message: other.to_string(),
        },
    }
}
