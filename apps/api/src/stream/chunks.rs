use tracing::warn;

use crate::models::chat::StreamChunk;
use crate::stream::decoder::{event_payload, LineDecoder};

/// Turns the relay's byte stream back into `StreamChunk`s.
///
/// Unparseable events are counted and skipped; they never end the stream.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    lines: LineDecoder,
    malformed: usize,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        let lines = self.lines.feed(bytes);
        lines.iter().filter_map(|line| self.parse(line)).collect()
    }

    pub fn finish(&mut self) -> Vec<StreamChunk> {
        match self.lines.finish() {
            Some(line) => self.parse(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Number of events skipped because their payload was not a chunk.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    fn parse(&mut self, line: &str) -> Option<StreamChunk> {
        let payload = event_payload(line)?;
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                self.malformed += 1;
                warn!("Skipping malformed stream event: {e}");
                None
            }
        }
    }
}
