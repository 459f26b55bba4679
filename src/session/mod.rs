//! Session management module

pub mod handle;
pub mod lifecycle;
pub mod openai;

pub use handle::{ChatSession, SessionFactory};
pub use lifecycle::{LifecycleStatus, Progress, ReadinessState, SessionLifecycle};
pub use openai::{OpenAiClient, OpenAiSession, OpenAiSessionFactory};
