// Chat relay: validation, context assembly, upstream streaming.
// All upstream calls go through llm_client.

pub mod context;
pub mod handlers;
pub mod relay;
pub mod suggestions;
pub mod validation;
