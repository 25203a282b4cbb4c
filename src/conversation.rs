use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topic::{Category, Reply};

/// Position of a message in its session, starting at 1.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct MessageId(pub u64);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Bot,
}

/// One turn of the transcript. Only bot messages carry a topic, suggestions,
/// commands and a category; the constructors keep it that way.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    text: String,
    origin: Origin,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
}

impl Message {
    fn user(id: MessageId, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            origin: Origin::User,
            created_at,
            topic_id: None,
            suggestions: None,
            commands: None,
            category: None,
        }
    }

    fn bot(id: MessageId, reply: Reply, created_at: DateTime<Utc>) -> Self {
        let non_empty = |items: Vec<String>| (!items.is_empty()).then_some(items);
        Self {
            id,
            text: reply.text,
            origin: Origin::Bot,
            created_at,
            topic_id: Some(reply.topic_id),
            suggestions: non_empty(reply.suggestions),
            commands: non_empty(reply.commands),
            category: Some(reply.category),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn topic_id(&self) -> Option<&str> {
        self.topic_id.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        self.suggestions.as_deref().unwrap_or_default()
    }

    pub fn commands(&self) -> &[String] {
        self.commands.as_deref().unwrap_or_default()
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }
}

/// Everything one open chat widget shows. Messages can only be appended.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    pending_input: String,
    is_awaiting_response: bool,
    is_minimized: bool,
    #[serde(skip_serializing)]
    last_id: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.is_awaiting_response
    }

    pub fn is_minimized(&self) -> bool {
        self.is_minimized
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    pub fn set_awaiting_response(&mut self, awaiting: bool) {
        self.is_awaiting_response = awaiting;
    }

    pub fn toggle_minimized(&mut self) -> bool {
        self.is_minimized = !self.is_minimized;
        self.is_minimized
    }

    pub fn append_user(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> MessageId {
        let id = self.next_id();
        self.messages.push(Message::user(id, text.into(), at));
        id
    }

    pub fn append_bot(&mut self, reply: Reply, at: DateTime<Utc>) -> MessageId {
        let id = self.next_id();
        self.messages.push(Message::bot(id, reply, at));
        id
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn next_id(&mut self) -> MessageId {
        self.last_id += 1;
        MessageId(self.last_id)
    }
}
