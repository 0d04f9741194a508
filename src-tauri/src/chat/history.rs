use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const NEW_CHAT_TITLE: &str = "New Chat";

/// A conversation in the sidebar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: NEW_CHAT_TITLE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    chats: Vec<Chat>,
}

impl ChatHistory {
    pub fn list(&self) -> &[Chat] {
        &self.chats
    }

    /// Start a new, empty conversation.
    pub fn create(&mut self) -> Chat {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    fn create_with_id(&mut self, id: impl Into<String>) -> Chat {
        let chat = Chat::new(id);
        self.chats.push(chat.clone());
        chat
    }

    /// Returns whether a chat was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != id);
        self.chats.len() != before
    }
}
