//! Chat transcript recording

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::db::TranscriptRepository;

/// Where completed chat turns are written. Recording never fails a request.
#[derive(Clone, Default)]
pub struct Transcript {
    bot_name: String,
    repository: Option<TranscriptRepository>,
    log_file: Option<PathBuf>,
}

impl Transcript {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            repository: None,
            log_file: None,
        }
    }

    pub fn with_repository(mut self, repository: TranscriptRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub async fn record(&self, user_input: &str, reply: &str) {
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.append(&self.bot_name, user_input, reply).await {
                warn!("Failed to store transcript entry: {:#}", e);
            }
        }

        if let Some(path) = &self.log_file {
            if let Err(e) = append_log(path, &self.bot_name, user_input, reply).await {
                warn!("Failed to write chat log {}: {:#}", path.display(), e);
            }
        }
    }
}

async fn append_log(path: &Path, bot_name: &str, user_input: &str, reply: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .context("Failed to open chat log")?;

    let entry = format!("User: {}\n{}: {}\n\n", user_input, bot_name, reply);
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
