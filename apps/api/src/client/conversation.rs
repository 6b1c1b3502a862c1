use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::chat::{ChatMessage, HistoryEntry};

/// An ordered chat session as the client sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(new_conversation_id())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The assistant message still receiving text, if any.
    pub fn streaming_message_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| !m.is_user && m.is_streaming)
    }

    /// Prior turns in wire form, skipping failed and still-streaming replies.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|m| !m.is_streaming && m.error.is_none() && !m.message.is_empty())
            .map(ChatMessage::to_history_entry)
            .collect()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new_conversation_id() -> String {
    format!("conv_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_skips_unfinished_and_failed_replies() {
        let mut conversation = Conversation::new();
        conversation.push(ChatMessage::user("hi"));

        let mut answered = ChatMessage::assistant_placeholder();
        answered.append("hello");
        answered.finish();
        conversation.push(answered);

        let mut failed = ChatMessage::assistant_placeholder();
        failed.fail("timeout");
        conversation.push(failed);

        conversation.push(ChatMessage::user("and then?"));
        let mut pending = ChatMessage::assistant_placeholder();
        pending.append("partial");
        conversation.push(pending);

        let history = conversation.history_entries();
        let texts: Vec<&str> = history.iter().map(|h| h.message.as_str()).collect();
        assert_eq!(texts, ["hi", "hello", "and then?"]);
        assert!(conversation.streaming_message_mut().is_some());
    }

    #[test]
    fn test_ids_are_fresh() {
        assert_ne!(Conversation::new().id, Conversation::new().id);
        assert!(new_conversation_id().starts_with("conv_"));
    }
}
