//! Database module

pub mod connection;
pub mod repositories;
pub mod schema;

pub use connection::Database;
pub use repositories::transcript::{TranscriptEntry, TranscriptRepository};
