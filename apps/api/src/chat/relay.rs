//! Re-streams the provider's event stream to the client as `StreamChunk` frames.

use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::llm_client::events::{parse_provider_line, ProviderEvent};
use crate::llm_client::LlmError;
use crate::models::chat::StreamChunk;
use crate::stream::LineDecoder;

/// Terminal `error` values sent to the client.
pub const ERROR_TIMEOUT: &str = "timeout";
pub const ERROR_STREAM: &str = "stream_error";
pub const ERROR_UPSTREAM: &str = "upstream_error";

/// How a relay ended. Used for logging only; the client learns the outcome
/// from the terminal chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed { chunks: usize, chars: usize },
    TimedOut,
    Failed(String),
    /// The client went away; upstream reading stopped early.
    Cancelled,
}

struct Relay {
    tx: mpsc::Sender<StreamChunk>,
    chunks: usize,
    chars: usize,
}

impl Relay {
    /// Returns false once the receiver is gone.
    async fn send(&mut self, chunk: StreamChunk) -> bool {
        if !chunk.done {
            self.chunks += 1;
            self.chars += chunk.content.chars().count();
        }
        self.tx.send(chunk).await.is_ok()
    }

    async fn finish(mut self, terminal: StreamChunk, outcome: RelayOutcome) -> RelayOutcome {
        if self.send(terminal).await {
            outcome
        } else {
            RelayOutcome::Cancelled
        }
    }

    fn completed(&self) -> RelayOutcome {
        RelayOutcome::Completed {
            chunks: self.chunks,
            chars: self.chars,
        }
    }

    /// Forwards one provider line to the client.
    async fn forward_line(&mut self, line: &str) -> LineOutcome {
        match parse_provider_line(line) {
            Ok(Some(ProviderEvent::Delta(text))) => {
                if text.is_empty() || self.send(StreamChunk::text(text)).await {
                    LineOutcome::Continue
                } else {
                    LineOutcome::ClientGone
                }
            }
            Ok(Some(ProviderEvent::Done)) => LineOutcome::Done,
            Ok(Some(ProviderEvent::Failure(message))) => LineOutcome::ProviderError(message),
            Ok(None) => LineOutcome::Continue,
            Err(e) => {
                warn!("Skipping unparseable provider event: {e}");
                LineOutcome::Continue
            }
        }
    }
}

enum LineOutcome {
    Continue,
    Done,
    ProviderError(String),
    ClientGone,
}

/// Pumps `upstream` into `tx` until completion, failure, idle timeout, or
/// until the receiver is dropped.
///
/// Exactly one terminal chunk (`done = true`) is sent unless the client has
/// already gone away.
pub async fn relay_upstream<S>(
    mut upstream: S,
    idle_timeout: Duration,
    tx: mpsc::Sender<StreamChunk>,
) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, LlmError>> + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut relay = Relay {
        tx,
        chunks: 0,
        chars: 0,
    };

    loop {
        let next = tokio::select! {
            _ = relay.tx.closed() => return RelayOutcome::Cancelled,
            next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
        };

        match next {
            Err(_) => {
                warn!("Upstream idle for {:?}, aborting stream", idle_timeout);
                return relay
                    .finish(StreamChunk::failed(ERROR_TIMEOUT), RelayOutcome::TimedOut)
                    .await;
            }
            Ok(None) => {
                if let Some(line) = decoder.finish() {
                    match relay.forward_line(&line).await {
                        LineOutcome::Continue => {}
                        end => return end_stream(relay, end).await,
                    }
                }
                debug!("Upstream stream ended without [DONE]");
                let outcome = relay.completed();
                return relay.finish(StreamChunk::done(), outcome).await;
            }
            Ok(Some(Err(e))) => {
                warn!("Upstream stream error: {e}");
                return relay
                    .finish(
                        StreamChunk::failed(ERROR_STREAM),
                        RelayOutcome::Failed(e.to_string()),
                    )
                    .await;
            }
            Ok(Some(Ok(bytes))) => {
                for line in decoder.feed(&bytes) {
                    match relay.forward_line(&line).await {
                        LineOutcome::Continue => {}
                        end => return end_stream(relay, end).await,
                    }
                }
            }
        }
    }
}

async fn end_stream(relay: Relay, end: LineOutcome) -> RelayOutcome {
    match end {
        LineOutcome::Continue | LineOutcome::Done => {
            let outcome = relay.completed();
            relay.finish(StreamChunk::done(), outcome).await
        }
        LineOutcome::ClientGone => RelayOutcome::Cancelled,
        LineOutcome::ProviderError(message) => {
            warn!("Provider reported an error mid-stream: {message}");
            relay
                .finish(
                    StreamChunk::failed(ERROR_UPSTREAM),
                    RelayOutcome::Failed(message),
                )
                .await
        }
    }
}
