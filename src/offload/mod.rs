//! Offloading of blocking work to the worker pool

pub mod adapter;
pub mod extract;
pub mod ingest;
pub mod tokens;
pub mod transcribe;

pub use adapter::{BlockingCallAdapter, Operation, OperationKind};
pub use extract::{FileExtractor, FileKind, TextExtractor};
pub use tokens::{Chunker, DEFAULT_MAX_TOKENS};
pub use transcribe::{Transcriber, WhisperTranscriber};
