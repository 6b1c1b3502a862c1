//! Persisted conversations on top of a [`KeyValueStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::client::conversation::new_conversation_id;
use crate::client::storage::{KeyValueStore, StorageError};
use crate::models::chat::ChatMessage;

const CONVERSATIONS_KEY: &str = "folio-conversations";
const CURRENT_CONVERSATION_KEY: &str = "folio-current-conversation";

pub const MAX_STORED_MESSAGES: usize = 50;
pub const MAX_CONVERSATIONS: usize = 10;
pub const MAX_CONTEXT_MESSAGES: usize = 20;
const TITLE_CHARS: usize = 50;
const LAST_MESSAGE_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    /// Most recently updated first.
    pub conversations: Vec<ConversationMetadata>,
    pub current_conversation_id: Option<String>,
}

pub fn conversation_title(messages: &[ChatMessage]) -> String {
    match messages.iter().find(|m| m.is_user) {
        Some(first) => {
            let title: String = first.message.chars().take(TITLE_CHARS).collect();
            if title.len() < first.message.len() {
                format!("{title}...")
            } else {
                title
            }
        }
        None => "New Conversation".to_string(),
    }
}

/// Keeps the most recent `max` messages, re-inserting the first user message
/// at the front when it would otherwise fall off.
pub fn truncate_history(messages: &[ChatMessage], max: usize) -> Vec<ChatMessage> {
    if messages.len() <= max {
        return messages.to_vec();
    }
    let recent = &messages[messages.len() - max..];
    match messages.iter().find(|m| m.is_user) {
        Some(first) if !recent.iter().any(|m| m.id == first.id) => {
            let mut kept = Vec::with_capacity(max);
            kept.push(first.clone());
            kept.extend(recent.iter().skip(1).cloned());
            kept
        }
        _ => recent.to_vec(),
    }
}

fn messages_key(id: &str) -> String {
    format!("conversation_{id}")
}

pub struct ConversationStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.store.set(key, &serde_json::to_string(value)?)
    }

    pub fn summary(&self) -> Result<ConversationSummary, StorageError> {
        let mut conversations: Vec<ConversationMetadata> =
            self.read(CONVERSATIONS_KEY)?.unwrap_or_default();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(ConversationSummary {
            conversations,
            current_conversation_id: self.current_id()?,
        })
    }

    pub fn load(&self, id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        Ok(self.read(&messages_key(id))?.unwrap_or_default())
    }

    /// Persists the most recent messages and refreshes the metadata list,
    /// making `id` the current conversation.
    pub fn save(&self, id: &str, messages: &[ChatMessage]) -> Result<(), StorageError> {
        let start = messages.len().saturating_sub(MAX_STORED_MESSAGES);
        let stored = &messages[start..];
        self.write(&messages_key(id), stored)?;

        let summary = self.summary()?;
        let now = Utc::now();
        let existing = summary.conversations.iter().position(|c| c.id == id);
        let metadata = ConversationMetadata {
            id: id.to_string(),
            title: conversation_title(messages),
            created_at: existing
                .map(|i| summary.conversations[i].created_at)
                .unwrap_or(now),
            updated_at: now,
            message_count: stored.len(),
            last_message: stored
                .last()
                .map(|m| m.message.chars().take(LAST_MESSAGE_CHARS).collect()),
        };

        let mut conversations = summary.conversations;
        if let Some(i) = existing {
            conversations.remove(i);
        }
        conversations.insert(0, metadata);

        for dropped in conversations.iter().skip(MAX_CONVERSATIONS) {
            debug!(conversation = %dropped.id, "Evicting old conversation");
            self.store.remove(&messages_key(&dropped.id))?;
        }
        conversations.truncate(MAX_CONVERSATIONS);

        self.write(CONVERSATIONS_KEY, &conversations)?;
        self.set_current_id(id)
    }

    pub fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.store.remove(&messages_key(id))?;
        let summary = self.summary()?;
        let remaining: Vec<_> = summary
            .conversations
            .into_iter()
            .filter(|c| c.id != id)
            .collect();
        self.write(CONVERSATIONS_KEY, &remaining)?;
        if summary.current_conversation_id.as_deref() == Some(id) {
            self.store.remove(CURRENT_CONVERSATION_KEY)?;
        }
        Ok(())
    }

    pub fn clear_all(&self) -> Result<(), StorageError> {
        for conversation in self.summary()?.conversations {
            self.store.remove(&messages_key(&conversation.id))?;
        }
        self.store.remove(CONVERSATIONS_KEY)?;
        self.store.remove(CURRENT_CONVERSATION_KEY)
    }

    pub fn current_id(&self) -> Result<Option<String>, StorageError> {
        self.read(CURRENT_CONVERSATION_KEY)
    }

    pub fn set_current_id(&self, id: &str) -> Result<(), StorageError> {
        self.write(CURRENT_CONVERSATION_KEY, id)
    }

    /// Starts a fresh conversation and makes it current.
    pub fn create(&self) -> Result<String, StorageError> {
        let id = new_conversation_id();
        self.set_current_id(&id)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{FileStore, MemoryStore};

    fn store() -> ConversationStore {
        ConversationStore::new(Arc::new(MemoryStore::new()))
    }

    fn exchange(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("question {i}"))
                } else {
                    let mut reply = ChatMessage::assistant_placeholder();
                    reply.append(&format!("answer {i}"));
                    reply.finish();
                    reply
                }
            })
            .collect()
    }

    #[test]
    fn test_title_from_first_user_message() {
        assert_eq!(conversation_title(&[]), "New Conversation");
        assert_eq!(conversation_title(&exchange(2)), "question 0");

        let long = ChatMessage::user("x".repeat(80));
        let title = conversation_title(&[long]);
        assert_eq!(title, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn test_save_and_load_round() {
        let store = store();
        let messages = exchange(4);
        store.save("conv_a", &messages).unwrap();

        assert_eq!(store.load("conv_a").unwrap(), messages);
        let summary = store.summary().unwrap();
        assert_eq!(summary.current_conversation_id.as_deref(), Some("conv_a"));
        assert_eq!(summary.conversations[0].message_count, 4);
        assert_eq!(summary.conversations[0].last_message.as_deref(), Some("answer 3"));
    }

    #[test]
    fn test_stored_messages_are_bounded() {
        let store = store();
        let messages = exchange(60);
        store.save("conv_a", &messages).unwrap();
        let loaded = store.load("conv_a").unwrap();
        assert_eq!(loaded.len(), MAX_STORED_MESSAGES);
        assert_eq!(loaded.last(), messages.last());
    }

    #[test]
    fn test_conversation_list_is_bounded_and_ordered() {
        let store = store();
        for i in 0..12 {
            store.save(&format!("conv_{i}"), &exchange(2)).unwrap();
        }
        let summary = store.summary().unwrap();
        assert_eq!(summary.conversations.len(), MAX_CONVERSATIONS);
        assert_eq!(summary.conversations[0].id, "conv_11");
        assert!(store.load("conv_0").unwrap().is_empty());

        // Re-saving an existing conversation keeps its creation time.
        let created = summary.conversations[5].created_at;
        let id = summary.conversations[5].id.clone();
        store.save(&id, &exchange(3)).unwrap();
        let summary = store.summary().unwrap();
        assert_eq!(summary.conversations[0].id, id);
        assert_eq!(summary.conversations[0].created_at, created);
        assert_eq!(summary.conversations.len(), MAX_CONVERSATIONS);
    }

    #[test]
    fn test_delete_clears_current() {
        let store = store();
        store.save("conv_a", &exchange(2)).unwrap();
        store.save("conv_b", &exchange(2)).unwrap();
        store.delete("conv_b").unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.conversations.len(), 1);
        assert_eq!(summary.current_conversation_id, None);
        assert!(store.load("conv_b").unwrap().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        store.save("conv_a", &exchange(2)).unwrap();
        store.clear_all().unwrap();
        assert!(store.summary().unwrap().conversations.is_empty());
        assert!(store.load("conv_a").unwrap().is_empty());
        assert_eq!(store.current_id().unwrap(), None);
    }

    #[test]
    fn test_create_sets_current() {
        let store = store();
        let id = store.create().unwrap();
        assert_eq!(store.current_id().unwrap(), Some(id));
    }

    #[test]
    fn test_truncate_keeps_first_user_message() {
        let messages = exchange(30);
        let kept = truncate_history(&messages, MAX_CONTEXT_MESSAGES);
        assert_eq!(kept.len(), MAX_CONTEXT_MESSAGES);
        assert_eq!(kept[0].message, "question 0");
        assert_eq!(kept.last(), messages.last());

        let short = exchange(5);
        assert_eq!(truncate_history(&short, MAX_CONTEXT_MESSAGES), short);
    }
}
