pub mod chat;
pub mod client;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod request_context;
pub mod retry;
pub mod routes;
pub mod state;
pub mod stream;
