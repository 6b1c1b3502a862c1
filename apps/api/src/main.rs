use std::net::SocketAddr;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio::config::Config;
use folio::models::profile::{Completeness, Profile};
use folio::routes::build_router;
use folio::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Only malformed values fail here; a missing API key just disables chat
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    let env = config.validate();
    for warning in &env.warnings {
        warn!("{warning}");
    }
    for error in &env.errors {
        warn!("Configuration error: {error}");
    }
    info!(
        valid = env.is_valid,
        chat_enabled = env.chat_enabled,
        environment = %config.app_env,
        "Environment validated"
    );

    let profile = Profile::load(config.profile_path.as_deref()).context("loading profile")?;
    if profile.completeness() == Completeness::Warning {
        warn!("Profile is incomplete; answers will be thin");
    }
    info!(name = %profile.profile.name, "Profile loaded");

    let port = config.port;
    let state = AppState::new(config, profile)?;
    info!("LLM client initialized (model: {})", state.llm.model());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
