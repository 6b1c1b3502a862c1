pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/chat", post(handlers::handle_chat))
        .route("/api/chat/suggestions", post(handlers::handle_suggestions))
        .with_state(state)
}
