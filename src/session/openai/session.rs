//! OpenAI-backed chat session

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::client::{ChatCompletionRequest, ChatMessage, OpenAiClient};
use crate::config::OpenAiConfig;
use crate::session::handle::{ChatSession, SessionFactory};

/// Rolling conversation history.
///
/// Once the history grows past `limit` messages, the third-oldest message is dropped until it
/// fits again, so the opening exchange and the latest turns survive.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    limit: usize,
}

impl Conversation {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit: limit.max(2),
        }
    }

    fn trim(&mut self) {
        while self.messages.len() > self.limit {
            self.messages.remove(2);
        }
    }

    /// Messages to send: the system prompt followed by the history
    pub fn with_system(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(self.messages.iter().cloned());
        messages
    }

    /// Request for a new turn. The history itself is not touched until the turn succeeds.
    pub fn request_for(&self, system_prompt: &str, user_text: &str) -> Vec<ChatMessage> {
        let mut messages = self.with_system(system_prompt);
        messages.push(ChatMessage::user(user_text));
        messages
    }

    /// Append a completed exchange, keeping the user message next to its reply
    pub fn record_turn(&mut self, user_text: &str, reply: &str) {
        self.messages.push(ChatMessage::user(user_text));
        self.messages.push(ChatMessage::assistant(reply));
        self.trim();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Chat session talking to the OpenAI chat-completion API.
///
/// `chat` blocks the calling thread on the async client through a runtime handle captured
/// at construction, so it must run on a worker slot rather than on a runtime thread.
pub struct OpenAiSession {
    client: OpenAiClient,
    runtime: Handle,
    settings: OpenAiConfig,
    system_prompt: String,
    conversation: Mutex<Conversation>,
}

impl OpenAiSession {
    pub fn new(
        client: OpenAiClient,
        runtime: Handle,
        settings: OpenAiConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        let conversation = Mutex::new(Conversation::new(settings.history_limit));
        Self {
            client,
            runtime,
            settings,
            system_prompt: system_prompt.into(),
            conversation,
        }
    }

    fn conversation(&self) -> Result<MutexGuard<'_, Conversation>> {
        self.conversation
            .lock()
            .map_err(|_| anyhow::anyhow!("Conversation lock poisoned"))
    }
}

impl ChatSession for OpenAiSession {
    fn chat(&self, text: &str) -> Result<String> {
        let messages = self.conversation()?.request_for(&self.system_prompt, text);

        let request = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            frequency_penalty: self.settings.frequency_penalty,
            presence_penalty: self.settings.presence_penalty,
        };

        let reply = self
            .runtime
            .block_on(self.client.chat_completion(&request))
            .context("Chat completion failed")?;

        let mut conversation = self.conversation()?;
        conversation.record_turn(text, &reply);
        debug!(history = conversation.len(), "Conversation updated");

        Ok(reply)
    }
}

/// Builds the [`OpenAiSession`] from configuration
pub struct OpenAiSessionFactory {
    settings: OpenAiConfig,
    system_prompt: String,
}

impl OpenAiSessionFactory {
    pub fn new(settings: OpenAiConfig, system_prompt: impl Into<String>) -> Self {
        Self {
            settings,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl SessionFactory for OpenAiSessionFactory {
    async fn create(&self) -> Result<Arc<dyn ChatSession>> {
        if self.settings.api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is not set");
        }

        let client = OpenAiClient::from_config(&self.settings);
        if self.settings.verify_on_startup {
            client
                .list_models()
                .await
                .context("OpenAI startup handshake failed")?;
        }

        info!(model = %self.settings.model, "OpenAI chat session created");

        Ok(Arc::new(OpenAiSession::new(
            client,
            Handle::current(),
            self.settings.clone(),
            self.system_prompt.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn contents(conversation: &Conversation) -> Vec<&str> {
        conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect()
    }

    #[test]
    fn trim_drops_third_oldest_until_within_limit() {
        let mut conversation = Conversation::new(4);
        for turn in 1..=3 {
            conversation.record_turn(&format!("u{}", turn), &format!("a{}", turn));
        }

        assert_eq!(contents(&conversation), vec!["u1", "a1", "u3", "a3"]);
    }

    #[test]
    fn short_history_is_untouched() {
        let mut conversation = Conversation::new(4);
        conversation.record_turn("hello", "hi");
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn system_prompt_leads_the_request() {
        let conversation = Conversation::new(4);

        let messages = conversation.request_for("be brief", "hello");
        assert_eq!(messages[0], ChatMessage::system("be brief"));
        assert_eq!(messages[1], ChatMessage::user("hello"));
    }

    #[test]
    fn recorded_turns_stay_paired() {
        let mut conversation = Conversation::new(6);
        let first = conversation.request_for("sys", "u1");
        let second = conversation.request_for("sys", "u2");
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);

        conversation.record_turn("u2", "a2");
        conversation.record_turn("u1", "a1");
        assert_eq!(contents(&conversation), vec!["u2", "a2", "u1", "a1"]);
    }

    #[test]
    fn failed_completion_leaves_history_untouched() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let settings = OpenAiConfig {
            api_key: "test-key".to_string(),
            ..OpenAiConfig::default()
        };
        // Nothing listens on the discard port
        let client = OpenAiClient::new("test-key", "http://127.0.0.1:9", Duration::from_secs(2));
        let session = OpenAiSession::new(client, runtime.handle().clone(), settings, "sys");

        assert!(session.chat("hello").is_err());
        assert!(session.conversation.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn factory_without_api_key_fails() {
        let factory = OpenAiSessionFactory::new(OpenAiConfig::default(), "");
        let err = factory.create().await.err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
