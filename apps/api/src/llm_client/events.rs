//! Provider event-stream payloads (OpenAI-compatible `chat.completion.chunk`).

use serde::Deserialize;

use crate::stream::event_payload;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Incremental text. May be empty for role-only or finish chunks.
    Delta(String),
    /// Provider signalled the end of the completion.
    Done,
    /// Provider reported an error inside the stream.
    Failure(String),
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// Parses one line of the provider stream.
///
/// `Ok(None)` for lines carrying no event (blank separators, comments).
/// `Err` when a data line is not valid JSON; the caller decides whether to skip it.
pub fn parse_provider_line(line: &str) -> Result<Option<ProviderEvent>, serde_json::Error> {
    let Some(payload) = event_payload(line) else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == DONE_SENTINEL {
        return Ok(Some(ProviderEvent::Done));
    }

    let chunk: CompletionChunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        return Ok(Some(ProviderEvent::Failure(error.message)));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .take(1)
        .filter_map(|c| c.delta.content)
        .collect();
    Ok(Some(ProviderEvent::Delta(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_content() {
        let line = r#"data: {"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_provider_line(line).unwrap(),
            Some(ProviderEvent::Delta("Hi".to_string()))
        );
    }

    #[test]
    fn test_role_only_delta_is_empty() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(
            parse_provider_line(line).unwrap(),
            Some(ProviderEvent::Delta(String::new()))
        );
    }

    #[test]
    fn test_done_sentinel() {
        assert_eq!(
            parse_provider_line("data: [DONE]").unwrap(),
            Some(ProviderEvent::Done)
        );
    }

    #[test]
    fn test_in_stream_error() {
        let line = r#"data: {"error":{"message":"overloaded","type":"server_error"}}"#;
        assert_eq!(
            parse_provider_line(line).unwrap(),
            Some(ProviderEvent::Failure("overloaded".to_string()))
        );
    }

    #[test]
    fn test_non_event_lines() {
        assert_eq!(parse_provider_line("").unwrap(), None);
        assert_eq!(parse_provider_line(": ping").unwrap(), None);
        assert_eq!(parse_provider_line("event: completion").unwrap(), None);
    }

    #[test]
    fn test_garbage_data_is_an_error() {
        assert!(parse_provider_line("data: {oops").is_err());
    }
}
