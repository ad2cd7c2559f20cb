use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::ids::{MessageId, SessionId};

/// Title carried by a session until its first user message arrives.
pub const DEFAULT_SESSION_TITLE: &str = "New chat";

/// Titles derived from a first message keep at most this many characters.
pub const TITLE_MAX_CHARS: usize = 20;

const TITLE_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub created_at: u64,
}

impl Session {
    pub fn fresh() -> Self {
        Self {
            id: SessionId::generate(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            created_at: now_unix_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Card,
}

/// Lifecycle of one message. Transitions only move forward:
/// `Loading -> Typing -> Sent` for text replies, `Loading -> Sent` for cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Loading,
    Typing,
    Sent,
}

impl MessageStatus {
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        next >= self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    pub status: MessageStatus,
    #[serde(default)]
    pub created_at: u64,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: MessageRole::User,
            kind: MessageKind::Text,
            content: content.into(),
            card_id: None,
            status: MessageStatus::Sent,
            created_at: now_unix_millis(),
        }
    }

    /// Assistant placeholder shown while the reply is being "thought about".
    pub fn assistant_loading(id: MessageId) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            kind: MessageKind::Text,
            content: String::new(),
            card_id: None,
            status: MessageStatus::Loading,
            created_at: now_unix_millis(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Everything persisted for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub draft: String,
    // Older payloads wrote the flag as `isFixed`.
    #[serde(default, alias = "isFixed")]
    pub pinned: bool,
}

impl SessionState {
    pub fn seeded(initial_messages: &[Message]) -> Self {
        Self {
            messages: initial_messages.to_vec(),
            draft: String::new(),
            pinned: false,
        }
    }

    pub fn message(&self, message_id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &MessageId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|message| &message.id == message_id)
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }

    /// Highest `m<n>` counter used by this transcript.
    pub fn max_message_sequence(&self) -> Option<u64> {
        self.messages
            .iter()
            .filter_map(|message| message.id.sequence())
            .max()
    }
}

/// Derives a session title from the first user message.
pub fn title_from_first_message(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }

    let mut title = text.chars().take(TITLE_MAX_CHARS).collect::<String>();
    title.push_str(TITLE_ELLIPSIS);
    title
}

pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}
