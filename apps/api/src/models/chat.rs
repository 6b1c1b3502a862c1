use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One prior turn as sent by the client in `conversationHistory`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub message: String,
    pub is_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Body of `POST /api/chat`, after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conversation_history: Vec<HistoryEntry>,
}

/// Reads an optional list where an explicit `null` means "no entries".
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The unit emitted by the relay and consumed by the client.
/// Many chunks compose one assistant message; the last one has `done = true`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
            error: None,
        }
    }

    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            done: true,
            error: Some(error.into()),
        }
    }

    /// Encodes the chunk as one server-sent event frame.
    pub fn to_sse_frame(&self) -> String {
        let payload = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"content":"","done":true,"error":"encoding_error"}"#.to_string()
        });
        format!("data: {payload}\n\n")
    }
}

/// Structured body of every non-streaming error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// A message in a client-side conversation.
///
/// Assistant messages are created on the first received chunk with
/// `is_streaming = true`, grow in place, and are frozen once the stream
/// completes, fails or is stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub message: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: text.into(),
            is_user: true,
            timestamp: Utc::now(),
            is_streaming: false,
            error: None,
        }
    }

    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4(),
            message: String::new(),
            is_user: false,
            timestamp: Utc::now(),
            is_streaming: true,
            error: None,
        }
    }

    /// Appends streamed text. Ignored once the message is frozen.
    pub fn append(&mut self, text: &str) {
        if self.is_streaming {
            self.message.push_str(text);
        }
    }

    pub fn finish(&mut self) {
        self.is_streaming = false;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.is_streaming = false;
    }

    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            message: self.message.clone(),
            is_user: self.is_user,
            timestamp: Some(self.timestamp.to_rfc3339()),
        }
    }
}
