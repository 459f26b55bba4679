//! Glitch configuration module

pub mod config;

pub use config::{Config, OpenAiConfig, PoolConfig, ServerConfig, SessionConfig};
