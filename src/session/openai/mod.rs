//! OpenAI session backend

pub mod client;
pub mod session;

pub use client::{ChatCompletionRequest, ChatMessage, OpenAiClient};
pub use session::{Conversation, OpenAiSession, OpenAiSessionFactory};
