//! Application state

use std::sync::Arc;

use anyhow::Result;

use super::coordinator::RequestCoordinator;
use super::transcript::Transcript;
use crate::config::Config;
use crate::db::{Database, TranscriptRepository};
use crate::offload::{BlockingCallAdapter, FileExtractor, TextExtractor, Transcriber, WhisperTranscriber};
use crate::pool::WorkerPool;
use crate::session::{OpenAiSessionFactory, SessionFactory, SessionLifecycle};

/// Everything a running process shares: one pool, one session lifecycle, one coordinator
pub struct AppState {
    pub config: Config,
    pub pool: Arc<WorkerPool>,
    pub lifecycle: SessionLifecycle,
    pub coordinator: RequestCoordinator,
    /// Transcript store, when one is configured
    pub db: Option<Database>,
}

impl AppState {
    /// Wire the pieces together. Must be called inside a tokio runtime.
    pub fn new(
        config: Config,
        factory: Arc<dyn SessionFactory>,
        extractor: Arc<dyn FileExtractor>,
        transcriber: Arc<dyn Transcriber>,
        transcript: Transcript,
    ) -> Self {
        let pool = Arc::new(WorkerPool::new(config.pool_options()));
        let lifecycle = SessionLifecycle::new(factory, config.progress_interval());
        let adapter = BlockingCallAdapter::new(
            pool.clone(),
            lifecycle.clone(),
            extractor,
            transcriber,
            config.ready_timeout(),
        )
        .with_operation_timeout(config.operation_timeout());

        Self {
            coordinator: RequestCoordinator::new(adapter, transcript),
            pool,
            lifecycle,
            config,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Production wiring: OpenAI session and transcriber, file extractor, optional database
    pub fn from_config(config: Config, db: Option<Database>) -> Result<Self> {
        let factory = Arc::new(OpenAiSessionFactory::new(
            config.openai.clone(),
            config.system_prompt.clone(),
        ));
        let transcriber = Arc::new(WhisperTranscriber::from_config(&config.openai)?);

        let mut transcript = Transcript::new(config.bot_name.clone());
        if let Some(db) = &db {
            transcript = transcript.with_repository(TranscriptRepository::new(db.clone()));
        }
        if let Some(path) = config.resolve_chat_log()? {
            transcript = transcript.with_log_file(path);
        }

        let state = Self::new(
            config,
            factory,
            Arc::new(TextExtractor),
            transcriber,
            transcript,
        );
        Ok(match db {
            Some(db) => state.with_database(db),
            None => state,
        })
    }

    pub fn bot_name(&self) -> &str {
        &self.config.bot_name
    }

    /// Drain the worker pool
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
