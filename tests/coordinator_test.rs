// Request coordinator tests

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{adapter_with, EchoSession, FakeFactory, StubTranscriber};
use glitch::config::Config;
use glitch::core::coordinator::NO_VALID_FILES;
use glitch::core::{AppState, ErrorKind, Request, RequestCoordinator, Response, Transcript};
use glitch::db::{Database, TranscriptRepository};
use glitch::offload::TextExtractor;
use tempfile::TempDir;

fn coordinator(factory: FakeFactory) -> RequestCoordinator {
    let adapter = adapter_with(2, Arc::new(factory));
    adapter.lifecycle().start_initialization();
    RequestCoordinator::new(adapter, Transcript::new("Glitch"))
}

fn chat(message: &str) -> Request {
    Request::Chat {
        message: message.to_string(),
    }
}

#[tokio::test]
async fn test_blank_message_skips_the_pool() {
    let coordinator = coordinator(FakeFactory::ready(Duration::ZERO));

    let response = coordinator.handle(chat("   \n")).await;

    assert_eq!(
        response,
        Response::Chat {
            response: String::new()
        }
    );
    assert_eq!(coordinator.adapter().pool().stats().started, 0);
}

#[tokio::test]
async fn test_chat_reply_comes_from_session() {
    let factory = FakeFactory::ready(Duration::from_millis(20));
    let session = factory.session.clone();
    let coordinator = coordinator(factory);

    let response = coordinator.handle(chat("  hello there ")).await;

    assert_eq!(
        response,
        Response::Chat {
            response: "echo: hello there".to_string()
        }
    );
    assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.adapter().pool().stats().completed, 1);
}

#[tokio::test]
async fn test_failed_session_reports_error_without_submitting() {
    let coordinator = coordinator(FakeFactory::failing(Duration::from_millis(10), "no api key"));

    let response = coordinator.handle(chat("hello")).await;

    assert!(response.is_error());
    assert_eq!(response.error_kind(), Some(ErrorKind::SessionUnavailable));
    assert!(response.text().starts_with("Error communicating with chatbot"));
    assert!(response.text().contains("no api key"));
    assert_eq!(coordinator.adapter().pool().stats().started, 0);
}

#[tokio::test]
async fn test_chat_waits_for_slow_initialization() {
    let coordinator = coordinator(FakeFactory::ready(Duration::from_millis(150)));

    let (a, b) = tokio::join!(
        coordinator.handle(chat("first")),
        coordinator.handle(chat("second"))
    );

    assert_eq!(a.text(), "echo: first");
    assert_eq!(b.text(), "echo: second");
    assert_eq!(coordinator.adapter().lifecycle().constructions(), 1);
}

#[tokio::test]
async fn test_files_keyword_sends_extracted_text() {
    let temp = TempDir::new().unwrap();
    let notes = temp.path().join("notes.txt");
    std::fs::write(&notes, "meeting at noon").unwrap();
    let missing = temp.path().join("missing.txt");

    let coordinator = coordinator(FakeFactory::ready(Duration::ZERO));
    let message = format!("files: {}, {}", notes.display(), missing.display());

    let response = coordinator.handle(chat(&message)).await;

    assert!(!response.is_error());
    assert!(response.text().starts_with("echo: "));
    assert!(response.text().contains("meeting at noon"));
}

#[tokio::test]
async fn test_files_keyword_without_readable_files() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.txt");

    let factory = FakeFactory::ready(Duration::ZERO);
    let session = factory.session.clone();
    let coordinator = coordinator(factory);

    let response = coordinator
        .handle(chat(&format!("files: {}", missing.display())))
        .await;

    assert_eq!(response.text(), NO_VALID_FILES);
    assert_eq!(session.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_extract_unsupported_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let binary = temp.path().join("image.png");
    std::fs::write(&binary, [0u8, 1, 2, 3]).unwrap();

    let coordinator = coordinator(FakeFactory::ready(Duration::ZERO));
    let response = coordinator
        .handle(Request::ExtractFile { path: binary })
        .await;

    assert_eq!(response.error_kind(), Some(ErrorKind::OperationFailed));
    assert!(response.text().starts_with("Error extracting file"));
    assert!(response.text().contains("Unsupported file type"));
}

#[tokio::test]
async fn test_extract_and_transcribe_do_not_need_the_session() {
    let temp = TempDir::new().unwrap();
    let notes = temp.path().join("notes.md");
    std::fs::write(&notes, "# Title").unwrap();
    let audio = temp.path().join("memo.mp3");
    std::fs::write(&audio, [0u8; 16]).unwrap();

    let coordinator = coordinator(FakeFactory::failing(Duration::ZERO, "offline"));

    let file = coordinator
        .handle(Request::ExtractFile { path: notes })
        .await;
    assert_eq!(
        file,
        Response::File {
            file_contents: "# Title".to_string()
        }
    );

    let transcript = coordinator.handle(Request::Transcribe { path: audio }).await;
    assert_eq!(
        transcript,
        Response::Transcript {
            transcript: "transcript of memo.mp3".to_string()
        }
    );
}

#[tokio::test]
async fn test_completed_turns_are_recorded() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("chat_log.txt");
    let db = Database::in_memory().unwrap();
    let repo = TranscriptRepository::new(db.clone());

    let adapter = adapter_with(1, Arc::new(FakeFactory::ready(Duration::ZERO)));
    adapter.lifecycle().start_initialization();
    let transcript = Transcript::new("Glitch")
        .with_repository(repo.clone())
        .with_log_file(&log);
    let coordinator = RequestCoordinator::new(adapter, transcript);

    coordinator.handle(chat("ping")).await;

    let entries = repo.recent(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_input, "ping");
    assert_eq!(entries[0].reply, "echo: ping");

    let written = std::fs::read_to_string(&log).unwrap();
    assert_eq!(written, "User: ping\nGlitch: echo: ping\n\n");
}

#[tokio::test]
async fn test_failed_turns_are_not_recorded() {
    let db = Database::in_memory().unwrap();
    let repo = TranscriptRepository::new(db);

    let adapter = adapter_with(1, Arc::new(FakeFactory::failing(Duration::ZERO, "down")));
    adapter.lifecycle().start_initialization();
    let coordinator =
        RequestCoordinator::new(adapter, Transcript::new("Glitch").with_repository(repo.clone()));

    let response = coordinator.handle(chat("ping")).await;

    assert!(response.is_error());
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_files_are_not_extracted_for_a_failed_session() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    std::fs::write(&a, "first file").unwrap();
    std::fs::write(&b, "second file").unwrap();

    let coordinator = coordinator(FakeFactory::failing(Duration::from_millis(10), "no api key"));
    let message = format!("files: {}, {}", a.display(), b.display());

    let response = coordinator.handle(chat(&message)).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::SessionUnavailable));
    assert_eq!(coordinator.adapter().pool().stats().started, 0);
}

#[tokio::test]
async fn test_slow_chat_turn_times_out() {
    let factory = FakeFactory {
        delay: Duration::ZERO,
        failure: None,
        session: Arc::new(EchoSession::slow(Duration::from_millis(300))),
    };
    let adapter =
        adapter_with(1, Arc::new(factory)).with_operation_timeout(Some(Duration::from_millis(50)));
    adapter.lifecycle().start_initialization();
    let coordinator = RequestCoordinator::new(adapter, Transcript::new("Glitch"));

    let response = coordinator.handle(chat("hello")).await;

    assert_eq!(response.error_kind(), Some(ErrorKind::OperationTimeout));
}

#[tokio::test]
async fn test_requests_after_shutdown_report_closed_pool() {
    let temp = TempDir::new().unwrap();
    let notes = temp.path().join("notes.txt");
    std::fs::write(&notes, "after hours").unwrap();

    let state = AppState::new(
        Config::default(),
        Arc::new(FakeFactory::ready(Duration::ZERO)),
        Arc::new(TextExtractor),
        Arc::new(StubTranscriber),
        Transcript::new("Glitch"),
    );
    state.lifecycle.start_initialization();
    state.shutdown().await;

    let reply = state.coordinator.handle(chat("hello")).await;
    assert_eq!(reply.error_kind(), Some(ErrorKind::PoolClosed));

    let file = state
        .coordinator
        .handle(Request::ExtractFile { path: notes })
        .await;
    assert_eq!(file.error_kind(), Some(ErrorKind::PoolClosed));
}
