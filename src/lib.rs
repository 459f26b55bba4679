//! Glitch - chat backend that keeps blocking model calls, file extraction and transcription
//! off the request path

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod http;
pub mod offload;
pub mod pool;
pub mod session;
