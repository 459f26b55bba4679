//! Audio transcription

use std::path::Path;

use anyhow::{Context, Result};
use tokio::runtime::Handle;

use crate::config::OpenAiConfig;
use crate::session::OpenAiClient;

/// Turns an audio file into text. Blocking; runs on a worker slot.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Whisper API transcriber
pub struct WhisperTranscriber {
    client: OpenAiClient,
    runtime: Handle,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(client: OpenAiClient, runtime: Handle, model: impl Into<String>) -> Self {
        Self {
            client,
            runtime,
            model: model.into(),
        }
    }

    /// Build from config, capturing the current runtime
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let runtime = Handle::try_current().context("Transcriber requires a tokio runtime")?;
        Ok(Self::new(
            OpenAiClient::from_config(config),
            runtime,
            config.transcription_model.clone(),
        ))
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            anyhow::bail!("File does not exist: {}", path.display());
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_lowercase();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio.{}", extension));
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        self.runtime.block_on(self.client.transcribe(
            &self.model,
            file_name,
            audio_mime_type(&extension),
            bytes,
        ))
    }
}

pub fn audio_mime_type(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/m4a",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "mp4" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
