//! The core models for managing a stateful chat with an LLM.
use serde::{Deserialize, Serialize};

use crate::openai::{Message, Role};
use crate::retriever::Passage;

/// A transcript entry. Assistant answers carry the passages that
/// were used to ground them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Passage>>,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            chunks: None,
        }
    }

    pub fn assistant(content: &str, chunks: Vec<Passage>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            chunks: Some(chunks),
        }
    }

    /// The message as the completion API sees it. Chunks stay local.
    pub fn to_message(&self) -> Message {
        Message::new(self.role, &self.content)
    }
}

#[derive(Default, Clone, Debug)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub(crate) fn push(&mut self, msg: ChatMessage) {
        self.0.push(msg)
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }

    /// User and assistant turns in the shape sent to the LLM.
    pub fn history(&self) -> Vec<Message> {
        self.0
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(ChatMessage::to_message)
            .collect()
    }

    /// Pretty printed JSON array of `{role, content, chunks?}`.
    pub fn export(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}
