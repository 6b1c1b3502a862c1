//! Axum route handlers for the Chat API.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, Instrument};

use crate::chat::context::{build_system_instruction, ContextLimits};
use crate::chat::relay::{relay_upstream, RelayOutcome};
use crate::chat::suggestions::suggest;
use crate::chat::validation::{sanitize_input, validate_chat_request};
use crate::errors::AppError;
use crate::models::chat::{null_as_empty, ChatRequest, HistoryEntry, StreamChunk};
use crate::request_context::{redact_sensitive, RequestContext};
use crate::state::AppState;

/// Frames buffered between the relay task and the response body.
const RELAY_BUFFER: usize = 64;

/// Streaming response body carrying `StreamChunk` frames.
pub struct SseResponse {
    rx: ReceiverStream<StreamChunk>,
}

impl SseResponse {
    fn new(rx: mpsc::Receiver<StreamChunk>) -> Self {
        Self {
            rx: ReceiverStream::new(rx),
        }
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let frames = self
            .rx
            .map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk.to_sse_frame())));

        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(frames),
        )
            .into_response()
    }
}

/// POST /api/chat
///
/// Validating → BuildingContext → CallingUpstream → Streaming. Failures before
/// streaming starts return a JSON error; failures after it become a terminal
/// chunk on the stream.
pub async fn handle_chat(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<SseResponse, AppError> {
    let ctx = RequestContext::new("chat-api", &method, &uri, &headers);
    let span = ctx.span();
    chat_pipeline(state, ctx, body).instrument(span).await
}

async fn chat_pipeline(
    state: AppState,
    ctx: RequestContext,
    body: Bytes,
) -> Result<SseResponse, AppError> {
    if !state.config.chat_enabled() {
        ctx.log_warning("environment-validation", "LLM_API_KEY missing or placeholder");
        return Err(AppError::ChatDisabled);
    }

    // Validating
    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        ctx.log_warning("request-parsing", &format!("Invalid JSON in request body: {e}"));
        AppError::InvalidJson(e.to_string())
    })?;

    let validation = validate_chat_request(&raw);
    if !validation.is_valid {
        ctx.log_warning(
            "request-validation",
            &format!(
                "Request validation failed: {:?}; body: {}",
                validation.errors,
                redact_sensitive(&raw)
            ),
        );
        return Err(AppError::Validation(validation.errors));
    }

    // Validated bodies always deserialize; failing here is a server bug.
    let request: ChatRequest = serde_json::from_value(raw).map_err(|e| {
        AppError::Internal(
            anyhow::Error::new(e).context("validated chat request did not deserialize"),
        )
    })?;
    let message = sanitize_input(&request.message);

    // BuildingContext
    let context = build_system_instruction(
        &state.profile,
        &message,
        &request.conversation_history,
        ContextLimits {
            history_turns: state.config.history_turns,
            budget_chars: state.config.context_budget,
        },
    );
    info!(
        topics = ?context.topics,
        history_included = context.history_included,
        history_dropped = context.history_dropped,
        system_chars = context.system.len(),
        "Context assembled"
    );

    // CallingUpstream
    let upstream = state
        .llm
        .open_stream(&context.system, &message)
        .await
        .map_err(|e| {
            ctx.log_error("llm-request", &e);
            AppError::from(e)
        })?;

    // Streaming
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    let idle_timeout = state.config.stream_idle_timeout;
    let relay_span = ctx.span();
    tokio::spawn(
        async move {
            match relay_upstream(upstream, idle_timeout, tx).await {
                RelayOutcome::Completed { chunks, chars } => {
                    info!(chunks, chars, "Stream completed")
                }
                RelayOutcome::TimedOut => ctx.log_warning("streaming", "Upstream idle timeout"),
                RelayOutcome::Failed(reason) => {
                    ctx.log_warning("streaming", &format!("Stream failed: {reason}"))
                }
                RelayOutcome::Cancelled => info!("Client disconnected, upstream released"),
            }
        }
        .instrument(relay_span),
    );

    Ok(SseResponse::new(rx))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub questions: Vec<String>,
}

/// POST /api/chat/suggestions
///
/// An empty body is treated as a fresh conversation.
pub async fn handle_suggestions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        SuggestionsRequest::default()
    } else {
        serde_json::from_slice::<SuggestionsRequest>(&body)
            .map_err(|e| AppError::InvalidJson(e.to_string()))?
    };

    Ok(Json(SuggestionsResponse {
        questions: suggest(&state.profile, &request.conversation_history),
    }))
}
