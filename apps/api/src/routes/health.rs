use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::profile::Completeness;
use crate::state::AppState;

const PROVIDER: &str = "openai-compatible";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub version: String,
    pub environment: String,
    pub response_time: String,
    pub services: Services,
    pub configuration: ConfigurationSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Services {
    pub portfolio: PortfolioService,
    pub chat: ChatService,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PortfolioService {
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatService {
    pub status: String,
    pub configured: bool,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    pub site_url: String,
    pub debug: bool,
}

/// GET /api/health
/// Reports configuration and profile status; 503 only when unhealthy.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();

    let env = state.config.validate();
    let (portfolio_status, portfolio_error) = match state.profile.completeness() {
        Completeness::Ok => ("ok", None),
        Completeness::Warning => ("warning", Some("Portfolio data incomplete".to_string())),
    };

    let status = if !env.is_valid {
        HealthStatus::Unhealthy
    } else if !env.chat_enabled || portfolio_status != "ok" {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let report = HealthReport {
        status,
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.app_env.clone(),
        response_time: format!("{}ms", started.elapsed().as_millis()),
        services: Services {
            portfolio: PortfolioService {
                status: portfolio_status.to_string(),
                error: portfolio_error,
            },
            chat: ChatService {
                status: if env.chat_enabled { "enabled" } else { "disabled" }.to_string(),
                configured: state.config.llm_api_key.is_some(),
                model: state.config.llm_model.clone(),
                provider: PROVIDER.to_string(),
            },
        },
        configuration: ConfigurationSummary {
            site_url: state.config.site_url.clone(),
            debug: state.config.debug,
        },
        warnings: env.warnings,
        errors: env.errors,
    };

    let http_status = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        http_status,
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        Json(report),
    )
}
