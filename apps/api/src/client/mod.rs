//! Client side of the chat endpoint: sends a message, consumes the chunk
//! stream into a conversation and persists it.

pub mod conversation;
pub mod history;
pub mod storage;

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chat::handlers::SuggestionsResponse;
use crate::chat::relay::ERROR_STREAM;
use crate::client::conversation::Conversation;
use crate::client::history::{truncate_history, MAX_CONTEXT_MESSAGES};
use crate::models::chat::{ChatMessage, ChatRequest, ErrorBody, HistoryEntry, StreamChunk};
use crate::retry::{is_retryable_status, with_retry, RetryPolicy, Retryable};
use crate::stream::ChunkDecoder;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} ({code}, status {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
        retry_after: Option<u64>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api { status, .. } => is_retryable_status(*status),
            ClientError::Network(e) => !e.is_decode() && !e.is_builder(),
            ClientError::Cancelled => false,
        }
    }
}

/// How consuming one reply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    /// A terminal chunk carried an error; it is recorded on the message.
    Failed(String),
    /// The stream closed without a `done` chunk.
    Interrupted,
    /// Stopped locally; the partial text is kept.
    Cancelled,
}

pub struct ChatClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Opens `POST /api/chat` and returns the raw chunk stream.
    /// Retries transient failures before any byte of the reply arrives.
    pub async fn open_chat(
        &self,
        message: &str,
        history: Vec<HistoryEntry>,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, ClientError> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_history: history,
        };
        let url = format!("{}/api/chat", self.base_url);

        let (http, url, request) = (&self.http, &url, &request);
        let response = with_retry(self.retry, move || async move {
            let response = http.post(url).json(request).send().await?;
            check_status(response).await
        })
        .await?;

        Ok(response.bytes_stream())
    }

    pub async fn suggestions(&self, history: &[HistoryEntry]) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/api/chat/suggestions", self.base_url);
        let body = json!({ "conversationHistory": history });

        let (http, url, body) = (&self.http, &url, &body);
        let response = with_retry(self.retry, move || async move {
            let response = http.post(url).json(body).send().await?;
            check_status(response).await
        })
        .await?;

        Ok(response.json::<SuggestionsResponse>().await?.questions)
    }

    /// Sends `text` as the next user turn and streams the reply into
    /// `conversation`, calling `on_text` for every piece of text received.
    pub async fn send<F>(
        &self,
        conversation: &mut Conversation,
        text: &str,
        cancel: &CancellationToken,
        on_text: F,
    ) -> Result<StreamOutcome, ClientError>
    where
        F: FnMut(&str),
    {
        let prior = truncate_history(&conversation.messages, MAX_CONTEXT_MESSAGES);
        let history = Conversation {
            id: conversation.id.clone(),
            messages: prior,
        }
        .history_entries();
        conversation.push(ChatMessage::user(text));

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            opened = self.open_chat(text, history) => opened?,
        };

        Ok(consume_stream(Box::pin(stream), conversation, cancel, on_text).await)
    }
}

/// Turns a non-2xx response into `ClientError::Api` using the server's
/// `{error, code, message}` body when it has one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(error) => (error.code, error.message),
        Err(_) => (format!("HTTP_{}", status.as_u16()), body),
    };
    warn!(status = status.as_u16(), %code, "Chat API returned an error");

    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
        retry_after,
    })
}

/// The assistant message being built from one reply.
struct Reply<'a> {
    conversation: &'a mut Conversation,
    index: Option<usize>,
}

impl<'a> Reply<'a> {
    /// Created on the first received chunk.
    fn message(&mut self) -> &mut ChatMessage {
        let conversation = &mut *self.conversation;
        let index = *self.index.get_or_insert_with(|| {
            conversation.push(ChatMessage::assistant_placeholder());
            conversation.messages.len() - 1
        });
        &mut self.conversation.messages[index]
    }

    fn freeze(&mut self) {
        if let Some(index) = self.index {
            self.conversation.messages[index].finish();
        }
    }

    fn apply<F: FnMut(&str)>(
        &mut self,
        chunk: StreamChunk,
        on_text: &mut F,
    ) -> Option<StreamOutcome> {
        let message = self.message();
        if !chunk.content.is_empty() {
            message.append(&chunk.content);
            on_text(&chunk.content);
        }
        if let Some(error) = chunk.error {
            message.fail(error.clone());
            return Some(StreamOutcome::Failed(error));
        }
        if chunk.done {
            message.finish();
            return Some(StreamOutcome::Completed);
        }
        None
    }
}

/// Reads a chunk stream into `conversation` until `done`, an error, the end
/// of the stream or `cancel` fires.
pub async fn consume_stream<S, E, F>(
    mut stream: S,
    conversation: &mut Conversation,
    cancel: &CancellationToken,
    mut on_text: F,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
    F: FnMut(&str),
{
    let mut decoder = ChunkDecoder::new();
    let mut reply = Reply {
        conversation,
        index: None,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reply.freeze();
                debug!("Reply stopped by the user");
                return StreamOutcome::Cancelled;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                for chunk in decoder.feed(&bytes) {
                    if let Some(outcome) = reply.apply(chunk, &mut on_text) {
                        return outcome;
                    }
                }
            }
            Some(Err(e)) => {
                warn!("Chat stream read failed: {e}");
                reply.message().fail(ERROR_STREAM);
                return StreamOutcome::Failed(ERROR_STREAM.to_string());
            }
            None => {
                for chunk in decoder.finish() {
                    if let Some(outcome) = reply.apply(chunk, &mut on_text) {
                        return outcome;
                    }
                }
                warn!("Chat stream ended without a done chunk");
                reply.freeze();
                return StreamOutcome::Interrupted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;

    use futures::stream;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frames(chunks: &[StreamChunk]) -> Vec<u8> {
        chunks
            .iter()
            .map(StreamChunk::to_sse_frame)
            .collect::<String>()
            .into_bytes()
    }

    fn reads(bytes: &[u8], size: usize) -> Vec<Result<Bytes, Infallible>> {
        bytes
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_consume_is_independent_of_read_boundaries() {
        let body = frames(&[
            StreamChunk::text("Olá, "),
            StreamChunk::text("I'm Alex 👋"),
            StreamChunk::done(),
        ]);

        for size in [1, 2, 3, 7, body.len()] {
            let mut conversation = Conversation::new();
            let mut seen = String::new();
            let outcome = consume_stream(
                stream::iter(reads(&body, size)),
                &mut conversation,
                &CancellationToken::new(),
                |t| seen.push_str(t),
            )
            .await;

            assert_eq!(outcome, StreamOutcome::Completed);
            let reply = &conversation.messages[0];
            assert_eq!(reply.message, "Olá, I'm Alex 👋");
            assert!(!reply.is_streaming);
            assert_eq!(seen, reply.message);
        }
    }

    #[tokio::test]
    async fn test_error_chunk_is_recorded() {
        let body = frames(&[StreamChunk::text("Part"), StreamChunk::failed("timeout")]);
        let mut conversation = Conversation::new();
        let outcome = consume_stream(
            stream::iter(reads(&body, 5)),
            &mut conversation,
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, StreamOutcome::Failed("timeout".to_string()));
        let reply = &conversation.messages[0];
        assert_eq!(reply.message, "Part");
        assert_eq!(reply.error.as_deref(), Some("timeout"));
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let mut body = b"data: not json\n\n".to_vec();
        body.extend(frames(&[StreamChunk::text("ok"), StreamChunk::done()]));
        let mut conversation = Conversation::new();
        let outcome = consume_stream(
            stream::iter(reads(&body, body.len())),
            &mut conversation,
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(conversation.messages[0].message, "ok");
    }

    #[tokio::test]
    async fn test_stream_end_without_done_freezes_reply() {
        let body = frames(&[StreamChunk::text("half")]);
        let mut conversation = Conversation::new();
        let outcome = consume_stream(
            stream::iter(reads(&body, 4)),
            &mut conversation,
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(outcome, StreamOutcome::Interrupted);
        assert_eq!(conversation.messages[0].message, "half");
        assert!(!conversation.messages[0].is_streaming);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_text() {
        let body = frames(&[StreamChunk::text("Hello")]);
        let upstream = stream::iter(reads(&body, body.len())).chain(stream::pending());
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let mut conversation = Conversation::new();

        let outcome = consume_stream(Box::pin(upstream), &mut conversation, &cancel, |_| {
            stopper.cancel()
        })
        .await;

        assert_eq!(outcome, StreamOutcome::Cancelled);
        let reply = &conversation.messages[0];
        assert_eq!(reply.message, "Hello");
        assert!(!reply.is_streaming);
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn test_send_appends_both_turns() {
        let server = MockServer::start().await;
        let body = frames(&[StreamChunk::text("Hi there"), StreamChunk::done()]);
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        let mut conversation = Conversation::new();
        let outcome = client
            .send(&mut conversation, "hello", &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(conversation.messages.len(), 2);
        assert!(conversation.messages[0].is_user);
        assert_eq!(conversation.messages[1].message, "Hi there");
    }

    #[tokio::test]
    async fn test_api_error_is_decoded_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "Invalid request",
                "code": "INVALID_REQUEST",
                "message": "Message cannot be empty"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri())
            .unwrap()
            .with_retry_policy(fast_retry());
        let err = client.open_chat("", Vec::new()).await.err().unwrap();
        match err {
            ClientError::Api { status, code, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "INVALID_REQUEST");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/suggestions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat/suggestions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "questions": ["Tell me more"] })),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri())
            .unwrap()
            .with_retry_policy(fast_retry());
        let questions = client.suggestions(&[]).await.unwrap();
        assert_eq!(questions, ["Tell me more"]);
    }
}
