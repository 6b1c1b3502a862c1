// Stream framing shared by the relay (provider side) and the client consumer.

pub mod chunks;
pub mod decoder;

pub use chunks::ChunkDecoder;
pub use decoder::{event_payload, LineDecoder};
