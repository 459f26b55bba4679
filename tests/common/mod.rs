// Shared fakes for integration tests
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use glitch::offload::{BlockingCallAdapter, Transcriber};
use glitch::offload::TextExtractor;
use glitch::pool::{PoolOptions, WorkerPool};
use glitch::session::{ChatSession, SessionFactory, SessionLifecycle};

/// Replies with the input, optionally after blocking for `delay`
pub struct EchoSession {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl EchoSession {
    pub fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

impl ChatSession for EchoSession {
    fn chat(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(format!("echo: {}", text))
    }
}

pub struct FakeFactory {
    pub delay: Duration,
    pub failure: Option<String>,
    pub session: Arc<EchoSession>,
}

impl FakeFactory {
    pub fn ready(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
            session: Arc::new(EchoSession::new()),
        }
    }

    pub fn failing(delay: Duration, reason: &str) -> Self {
        Self {
            delay,
            failure: Some(reason.to_string()),
            session: Arc::new(EchoSession::new()),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Arc<dyn ChatSession>> {
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(reason) => anyhow::bail!("{}", reason),
            None => Ok(self.session.clone() as Arc<dyn ChatSession>),
        }
    }
}

/// Returns the file name instead of calling a speech API
pub struct StubTranscriber;

impl Transcriber for StubTranscriber {
    fn transcribe(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            anyhow::bail!("File does not exist: {}", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("transcript of {}", name))
    }
}

pub fn adapter_with(pool_size: usize, factory: Arc<dyn SessionFactory>) -> BlockingCallAdapter {
    let pool = Arc::new(WorkerPool::new(PoolOptions::with_size(pool_size)));
    let lifecycle = SessionLifecycle::new(factory, Duration::from_millis(20));
    BlockingCallAdapter::new(
        pool,
        lifecycle,
        Arc::new(TextExtractor),
        Arc::new(StubTranscriber),
        Duration::from_secs(5),
    )
}
