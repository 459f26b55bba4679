//! Glitch configuration management
//! Handles loading and saving the config file

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pool::{default_pool_size, PoolOptions};

/// Glitch configuration, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name the bot answers with
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// System prompt sent ahead of every conversation
    #[serde(default)]
    pub system_prompt: String,

    /// Database path
    #[serde(default = "default_db_path")]
    pub database_path: String,

    /// Optional plain text chat log, appended after every turn
    #[serde(default)]
    pub chat_log: Option<String>,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_bot_name() -> String {
    "Glitch".to_string()
}

fn default_db_path() -> String {
    "~/.glitch/glitch.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            system_prompt: String::new(),
            database_path: default_db_path(),
            chat_log: None,
            openai: OpenAiConfig::default(),
            pool: PoolConfig::default(),
            session: SessionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Model API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key. `OPENAI_API_KEY` overrides this value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    /// Conversation messages kept between turns
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Query the models endpoint while building the session
    #[serde(default = "default_true")]
    pub verify_on_startup: bool,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-0125-preview".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_temperature() -> f32 {
    0.75
}

fn default_frequency_penalty() -> f32 {
    0.2
}

fn default_history_limit() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            transcription_model: default_transcription_model(),
            temperature: default_temperature(),
            frequency_penalty: default_frequency_penalty(),
            presence_penalty: 0.0,
            history_limit: default_history_limit(),
            request_timeout_secs: default_request_timeout(),
            verify_on_startup: true,
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Slot count. `GLITCH_POOL_SIZE` overrides it; unset means one slot per CPU.
    #[serde(default)]
    pub size: Option<usize>,
    /// Queue-depth bound. Unset keeps the queue unbounded.
    #[serde(default)]
    pub max_queue: Option<usize>,
    /// Per-operation timeout. Unset means operations may run indefinitely.
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_ready_timeout() -> u64 {
    30
}

fn default_progress_interval() -> u64 {
    200
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: default_ready_timeout(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load config from the default location or specified path
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = Self::config_path(path)?;

        let mut config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                serde_yaml::from_str(&raw).context("Failed to parse config file")?;
            debug!("Loaded config from {:?}", config_path);
            config
        } else {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Config::default();
            config.save(path)?;
            config
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse config from a YAML string, without touching the environment
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse config")
    }

    /// Save config to the default location
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = Self::config_path(path)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(&self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the config file path
    fn config_path(path: Option<&str>) -> Result<PathBuf> {
        // Check env override first
        if let Ok(env_path) = std::env::var("GLITCH_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        let home = dirs::home_dir().context("Cannot find home directory")?;
        Ok(home.join(".glitch").join("config.yml"))
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai.api_key = key.trim().to_string();
            }
        }
    }

    /// Resolve database path (expand ~)
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }

    pub fn resolve_chat_log(&self) -> Result<Option<PathBuf>> {
        self.chat_log.as_deref().map(expand_home).transpose()
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            size: default_pool_size(self.pool.size),
            max_queue: self.pool.max_queue,
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.session.ready_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.session.progress_interval_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.pool.operation_timeout_secs.map(Duration::from_secs)
    }
}

fn expand_home(path: &str) -> Result<PathBuf> {
    if !path.starts_with('~') {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Cannot find home directory")?;
    Ok(PathBuf::from(path.replacen('~', &home.to_string_lossy(), 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_source_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.bot_name, "Glitch");
        assert_eq!(config.openai.model, "gpt-4-0125-preview");
        assert_eq!(config.openai.history_limit, 4);
        assert!((config.openai.temperature - 0.75).abs() < f32::EPSILON);
        assert!(config.pool.max_queue.is_none());
        assert!(config.operation_timeout().is_none());
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_yaml(
            "pool:\n  size: 2\n  operation_timeout_secs: 5\nsession:\n  ready_timeout_secs: 3\n",
        )
        .unwrap();
        assert_eq!(config.pool.size, Some(2));
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.ready_timeout(), Duration::from_secs(3));
        assert_eq!(config.progress_interval(), Duration::from_millis(200));
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        let config = Config::from_yaml("database_path: /tmp/glitch.db\n").unwrap();
        assert_eq!(config.resolve_db_path().unwrap(), PathBuf::from("/tmp/glitch.db"));
        assert!(config.resolve_chat_log().unwrap().is_none());
    }
}
