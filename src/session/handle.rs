//! Session handle traits

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Established conversation context with the model API.
///
/// One instance exists per process. Implementations must tolerate concurrent `chat` calls,
/// since two chat turns may run on different worker slots at the same time.
pub trait ChatSession: Send + Sync {
    /// Run one conversation turn. Blocking: only call this from a worker slot.
    fn chat(&self, text: &str) -> Result<String>;
}

/// Builds the process-wide [`ChatSession`]. Called at most once per lifecycle.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn ChatSession>>;
}
