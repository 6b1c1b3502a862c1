use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::models::profile::Profile;

/// Shared application state injected into all route handlers via Axum extractors.
/// Everything here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profile: Arc<Profile>,
    pub llm: LlmClient,
}

impl AppState {
    pub fn new(config: Config, profile: Profile) -> anyhow::Result<Self> {
        let llm = LlmClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            profile: Arc::new(profile),
            llm,
        })
    }
}
