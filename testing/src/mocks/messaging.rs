//! Mock messaging client.

use super::lock;
use crate::epoch;
use herald_core::content::MessageContent;
use herald_core::model::{Channel, Message, MessageAuthor};
use herald_core::providers::MessagingClient;
use herald_core::{HeraldError, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail.
const OPERATIONS: [&str; 6] = ["send", "edit", "fetch", "delete", "channel", "reactors"];

/// A message written by the engine, as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Channel written to.
    pub location_id: String,
    /// Message id (assigned by the mock on send).
    pub message_id: String,
    /// Content of the call.
    pub content: MessageContent,
}

#[derive(Debug, Default)]
struct ChannelState {
    name: String,
    messages: BTreeMap<String, Message>,
    /// Current content of messages the engine sent, after edits.
    rendered: HashMap<String, MessageContent>,
}

#[derive(Debug, Default)]
struct State {
    channels: HashMap<String, ChannelState>,
    reactors: HashMap<(String, String), Vec<String>>,
    next_id: u64,
    sent: Vec<SentMessage>,
    edits: Vec<SentMessage>,
    deleted: Vec<(String, String)>,
    failures: Vec<(&'static str, HeraldError)>,
}

impl State {
    fn take_failure(&mut self, operation: &str) -> Result<()> {
        match self.failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn channel(&self, location_id: &str) -> Result<&ChannelState> {
        self.channels
            .get(location_id)
            .ok_or_else(|| HeraldError::not_found("channel", location_id))
    }

    fn channel_mut(&mut self, location_id: &str) -> Result<&mut ChannelState> {
        self.channels
            .get_mut(location_id)
            .ok_or_else(|| HeraldError::not_found("channel", location_id))
    }
}

/// Mock messaging surface holding channels and their messages.
///
/// Missing channels and messages answer `NotFound`, like the real API.
/// Failures are injected per operation with [`MockMessagingClient::fail_with`].
/// Every call yields to the runtime first, so concurrent jobs interleave.
#[derive(Debug, Clone, Default)]
pub struct MockMessagingClient {
    state: Arc<Mutex<State>>,
}

impl MockMessagingClient {
    /// Create an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn add_channel(&self, id: &str, name: &str) -> Result<()> {
        lock(&self.state)?.channels.insert(
            id.to_string(),
            ChannelState {
                name: name.to_string(),
                ..ChannelState::default()
            },
        );
        Ok(())
    }

    /// Delete a channel and everything in it.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn remove_channel(&self, id: &str) -> Result<()> {
        lock(&self.state)?.channels.remove(id);
        Ok(())
    }

    /// Place a message in an existing channel.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the channel does not exist.
    pub fn add_message(&self, message: Message) -> Result<()> {
        let mut state = lock(&self.state)?;
        state
            .channel_mut(&message.channel_id)?
            .messages
            .insert(message.id.clone(), message);
        Ok(())
    }

    /// Delete a message behind the engine's back.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn remove_message(&self, location_id: &str, message_id: &str) -> Result<()> {
        let mut state = lock(&self.state)?;
        if let Some(channel) = state.channels.get_mut(location_id) {
            channel.messages.remove(message_id);
            channel.rendered.remove(message_id);
        }
        Ok(())
    }

    /// Set who reacted to a message (any emoji).
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn set_reactors(&self, location_id: &str, message_id: &str, users: &[&str]) -> Result<()> {
        lock(&self.state)?.reactors.insert(
            (location_id.to_string(), message_id.to_string()),
            users.iter().map(ToString::to_string).collect(),
        );
        Ok(())
    }

    /// Fail the next call of `operation` with `error`.
    ///
    /// Unknown operation names are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn fail_with(&self, operation: &str, error: HeraldError) -> Result<()> {
        if let Some(op) = OPERATIONS.into_iter().find(|op| *op == operation) {
            lock(&self.state)?.failures.push((op, error));
        }
        Ok(())
    }

    /// Fail the next call of `operation` with a transient error.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn fail_next(&self, operation: &str) -> Result<()> {
        self.fail_with(operation, HeraldError::Transient(format!("injected {operation} failure")))
    }

    /// Every `send` call, in order.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn sent(&self) -> Result<Vec<SentMessage>> {
        Ok(lock(&self.state)?.sent.clone())
    }

    /// Every successful `edit` call, in order.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn edits(&self) -> Result<Vec<SentMessage>> {
        Ok(lock(&self.state)?.edits.clone())
    }

    /// Every `(location, message)` deleted by the engine.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn deleted(&self) -> Result<Vec<(String, String)>> {
        Ok(lock(&self.state)?.deleted.clone())
    }

    /// Current content of a message the engine sent, with edits applied.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn rendered(&self, location_id: &str, message_id: &str) -> Result<Option<MessageContent>> {
        Ok(lock(&self.state)?
            .channels
            .get(location_id)
            .and_then(|channel| channel.rendered.get(message_id))
            .cloned())
    }

    /// Number of live messages the engine sent to a channel.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn live_count(&self, location_id: &str) -> Result<usize> {
        Ok(lock(&self.state)?
            .channels
            .get(location_id)
            .map_or(0, |channel| channel.rendered.len()))
    }
}

fn bot_message(location_id: &str, id: &str, content: &MessageContent) -> Message {
    Message {
        id: id.to_string(),
        channel_id: location_id.to_string(),
        author: MessageAuthor {
            id: "bot".to_string(),
            display_name: "herald".to_string(),
            avatar_url: None,
        },
        content: content.text.clone().unwrap_or_default(),
        embeds: content.embeds.clone().unwrap_or_default(),
        attachments: Vec::new(),
        timestamp: epoch(),
        referenced: None,
    }
}

impl MessagingClient for MockMessagingClient {
    fn send(&self, location_id: &str, content: &MessageContent) -> impl Future<Output = Result<String>> + Send {
        let state = Arc::clone(&self.state);
        let location_id = location_id.to_string();
        let content = content.clone();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("send")?;
            state.next_id += 1;
            let id = format!("sent-{}", state.next_id);

            let channel = state.channel_mut(&location_id)?;
            channel
                .messages
                .insert(id.clone(), bot_message(&location_id, &id, &content));
            channel.rendered.insert(id.clone(), content.clone());
            state.sent.push(SentMessage {
                location_id,
                message_id: id.clone(),
                content,
            });
            Ok(id)
        }
    }

    fn edit(
        &self,
        location_id: &str,
        message_id: &str,
        content: &MessageContent,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let location_id = location_id.to_string();
        let message_id = message_id.to_string();
        let content = content.clone();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("edit")?;

            let channel = state.channel_mut(&location_id)?;
            let message = channel
                .messages
                .get_mut(&message_id)
                .ok_or_else(|| HeraldError::not_found("message", message_id.as_str()))?;
            if let Some(text) = &content.text {
                message.content.clone_from(text);
            }
            if let Some(embeds) = &content.embeds {
                message.embeds.clone_from(embeds);
            }

            let rendered = channel.rendered.entry(message_id.clone()).or_default();
            if content.text.is_some() {
                rendered.text.clone_from(&content.text);
            }
            if content.embeds.is_some() {
                rendered.embeds.clone_from(&content.embeds);
            }
            if !content.buttons.is_empty() {
                rendered.buttons.clone_from(&content.buttons);
            }

            state.edits.push(SentMessage {
                location_id,
                message_id,
                content,
            });
            Ok(())
        }
    }

    fn fetch(&self, location_id: &str, message_id: &str) -> impl Future<Output = Result<Message>> + Send {
        let state = Arc::clone(&self.state);
        let location_id = location_id.to_string();
        let message_id = message_id.to_string();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("fetch")?;
            state
                .channel(&location_id)?
                .messages
                .get(&message_id)
                .cloned()
                .ok_or_else(|| HeraldError::not_found("message", message_id))
        }
    }

    fn delete(&self, location_id: &str, message_id: &str) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let location_id = location_id.to_string();
        let message_id = message_id.to_string();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("delete")?;
            let channel = state.channel_mut(&location_id)?;
            channel
                .messages
                .remove(&message_id)
                .ok_or_else(|| HeraldError::not_found("message", message_id.as_str()))?;
            channel.rendered.remove(&message_id);
            state.deleted.push((location_id, message_id));
            Ok(())
        }
    }

    fn channel(&self, location_id: &str) -> impl Future<Output = Result<Channel>> + Send {
        let state = Arc::clone(&self.state);
        let location_id = location_id.to_string();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("channel")?;
            let name = state.channel(&location_id)?.name.clone();
            Ok(Channel { id: location_id, name })
        }
    }

    fn reactors(
        &self,
        location_id: &str,
        message_id: &str,
        _emoji: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send {
        let state = Arc::clone(&self.state);
        let key = (location_id.to_string(), message_id.to_string());

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.take_failure("reactors")?;
            if !state.channel(&key.0)?.messages.contains_key(&key.1) {
                return Err(HeraldError::not_found("message", key.1));
            }
            Ok(state.reactors.get(&key).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn missing_targets_are_not_found() {
        let client = MockMessagingClient::new();
        let err = client.fetch("1", "2").await.unwrap_err();
        assert!(err.is_not_found());

        client.add_channel("1", "general").unwrap();
        let err = client.edit("1", "2", &MessageContent::text("x")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn edits_merge_into_rendered_content() {
        let client = MockMessagingClient::new();
        client.add_channel("500", "starboard").unwrap();
        let id = client
            .send("500", &MessageContent::text("⭐ 3").with_button("Go to message", "https://x"))
            .await
            .unwrap();
        client.edit("500", &id, &MessageContent::text("⭐ 2")).await.unwrap();

        let rendered = client.rendered("500", &id).unwrap().unwrap();
        assert_eq!(rendered.text.as_deref(), Some("⭐ 2"));
        assert_eq!(rendered.buttons.len(), 1);
        assert_eq!(client.fetch("500", &id).await.unwrap().content, "⭐ 2");
    }

    #[tokio::test]
    async fn injected_failures_hit_one_call() {
        let client = MockMessagingClient::new();
        client.add_channel("10", "general").unwrap();
        client.add_message(fixtures::message("10", "1", "u1", "hi")).unwrap();
        client.fail_next("fetch").unwrap();

        assert!(client.fetch("10", "1").await.unwrap_err().is_retryable());
        assert!(client.fetch("10", "1").await.is_ok());
    }
}
