//! Per-request entry point
//!
//! A request moves through `Received -> AwaitingSession -> Queued -> Executing -> Completed`,
//! or ends in `Failed`. Queued and Executing happen inside the worker pool. Nothing is retried.

use std::path::PathBuf;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{CoreError, ErrorKind};
use super::transcript::Transcript;
use crate::offload::{BlockingCallAdapter, Operation, OperationKind};

/// Reply sent when a `files:` message named no readable file
pub const NO_VALID_FILES: &str = "No valid files were provided.";

const FILES_KEYWORD: &str = "files:";

#[derive(Debug, Clone)]
pub enum Request {
    Chat { message: String },
    ExtractFile { path: PathBuf },
    Transcribe { path: PathBuf },
}

impl Request {
    pub fn kind(&self) -> OperationKind {
        match self {
            Request::Chat { .. } => OperationKind::ChatTurn,
            Request::ExtractFile { .. } => OperationKind::FileExtract,
            Request::Transcribe { .. } => OperationKind::Transcribe,
        }
    }
}

/// The single outcome shape handed to the external boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Chat {
        response: String,
    },
    File {
        file_contents: String,
    },
    Transcript {
        transcript: String,
    },
    Error {
        error: String,
        #[serde(skip)]
        kind: ErrorKind,
    },
}

impl Response {
    fn failure(operation: OperationKind, error: &CoreError) -> Self {
        let prefix = match operation {
            OperationKind::ChatTurn => "Error communicating with chatbot",
            OperationKind::FileExtract => "Error extracting file",
            OperationKind::Transcribe => "Error transcribing audio",
        };
        Response::Error {
            error: format!("{}: {}", prefix, error),
            kind: error.kind(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Response::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The payload text, or the error message
    pub fn text(&self) -> &str {
        match self {
            Response::Chat { response } => response,
            Response::File { file_contents } => file_contents,
            Response::Transcript { transcript } => transcript,
            Response::Error { error, .. } => error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    AwaitingSession,
    Queued,
    Executing,
    Completed,
    Failed,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::AwaitingSession => "awaiting_session",
            RequestPhase::Queued => "queued",
            RequestPhase::Executing => "executing",
            RequestPhase::Completed => "completed",
            RequestPhase::Failed => "failed",
        }
    }
}

pub struct RequestCoordinator {
    adapter: BlockingCallAdapter,
    transcript: Transcript,
}

impl RequestCoordinator {
    pub fn new(adapter: BlockingCallAdapter, transcript: Transcript) -> Self {
        Self {
            adapter,
            transcript,
        }
    }

    pub fn adapter(&self) -> &BlockingCallAdapter {
        &self.adapter
    }

    /// Handle one request. Every outcome, including failures, comes back as a [`Response`].
    pub async fn handle(&self, request: Request) -> Response {
        let request_id = Uuid::new_v4();
        let kind = request.kind();
        debug!(%request_id, operation = kind.as_str(), phase = RequestPhase::Received.as_str(), "Request received");

        let result = match request {
            Request::Chat { message } => self
                .chat(request_id, &message)
                .await
                .map(|response| Response::Chat { response }),
            Request::ExtractFile { path } => self
                .adapter
                .run(Operation::FileExtract(path))
                .await
                .map(|file_contents| Response::File { file_contents }),
            Request::Transcribe { path } => self
                .adapter
                .run(Operation::Transcribe(path))
                .await
                .map(|transcript| Response::Transcript { transcript }),
        };

        match result {
            Ok(response) => {
                debug!(%request_id, phase = RequestPhase::Completed.as_str(), "Request completed");
                response
            }
            Err(e) => {
                warn!(%request_id, phase = RequestPhase::Failed.as_str(), error = %e, "Request failed");
                Response::failure(kind, &e)
            }
        }
    }

    async fn chat(&self, request_id: Uuid, message: &str) -> Result<String, CoreError> {
        let message = message.trim();
        if message.is_empty() {
            debug!(%request_id, "Empty message, nothing to send");
            return Ok(String::new());
        }

        debug!(%request_id, phase = RequestPhase::AwaitingSession.as_str(), "Waiting for chat session");
        // Files are only extracted once the session is known to be usable.
        self.adapter.session().await?;

        let input = match split_file_list(message) {
            Some(paths) => match self.collect_files(paths).await {
                Some(contents) => contents,
                None => return Ok(NO_VALID_FILES.to_string()),
            },
            None => message.to_string(),
        };

        let reply = self.adapter.run(Operation::ChatTurn(input.clone())).await?;
        self.transcript.record(&input, &reply).await;

        Ok(reply)
    }

    /// Extract the listed files concurrently; unreadable ones are skipped
    async fn collect_files(&self, paths: Vec<PathBuf>) -> Option<String> {
        let results = join_all(paths.into_iter().map(|path| async move {
            let result = self.adapter.run(Operation::FileExtract(path.clone())).await;
            (path, result)
        }))
        .await;

        let mut combined = String::new();
        let mut any = false;
        for (path, result) in results {
            match result {
                Ok(contents) => {
                    combined.push('\n');
                    combined.push_str(&contents);
                    any = true;
                }
                Err(e) => warn!("Skipping file {}: {}", path.display(), e),
            }
        }

        any.then_some(combined)
    }
}

/// Paths listed after the `files:` keyword, comma separated
pub fn split_file_list(message: &str) -> Option<Vec<PathBuf>> {
    let (_, list) = message.split_once(FILES_KEYWORD)?;
    Some(
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_list_follows_keyword() {
        let paths = split_file_list("summarize files: a.txt, docs/b.md ,").unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("docs/b.md")]);
    }

    #[test]
    fn plain_message_has_no_file_list() {
        assert!(split_file_list("what are files for?").is_none());
    }

    #[test]
    fn error_response_serializes_to_error_field_only() {
        let response = Response::failure(
            OperationKind::ChatTurn,
            &CoreError::SessionUnavailable("boom".to_string()),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "error": "Error communicating with chatbot: Chat session unavailable: boom" })
        );
    }

    #[test]
    fn chat_response_serializes_to_response_field() {
        let json = serde_json::to_value(Response::Chat {
            response: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "response": "hi" }));
    }
}
