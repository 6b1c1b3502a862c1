use axum::http::{HeaderMap, Method, Uri};
use serde_json::Value;
use tracing::{error, info_span, warn, Span};
use uuid::Uuid;

/// Key fragments whose values never reach the logs.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "key",
    "secret",
    "auth",
    "authorization",
    "api_key",
    "apikey",
    "access_token",
    "refresh_token",
];

/// Per-request logging context.
///
/// Created by the handler and passed down the chat pipeline explicitly, so
/// every event carries the same request id, component and step fields.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub component: &'static str,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn new(component: &'static str, method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let client_ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header("x-real-ip"));

        Self {
            request_id: Uuid::new_v4(),
            component,
            method: method.to_string(),
            path: uri.path().to_string(),
            user_agent: header("user-agent"),
            client_ip,
        }
    }

    pub fn span(&self) -> Span {
        info_span!(
            "request",
            request_id = %self.request_id,
            component = self.component,
            method = %self.method,
            path = %self.path,
        )
    }

    pub fn log_warning(&self, step: &str, message: &str) {
        warn!(
            request_id = %self.request_id,
            component = self.component,
            step,
            user_agent = self.user_agent.as_deref().unwrap_or("-"),
            "{message}"
        );
    }

    pub fn log_error(&self, step: &str, err: &dyn std::error::Error) {
        error!(
            request_id = %self.request_id,
            component = self.component,
            step,
            client_ip = self.client_ip.as_deref().unwrap_or("-"),
            "{err}"
        );
    }
}

/// Replaces values under sensitive-looking keys with `[REDACTED]`, recursively.
pub fn redact_sensitive(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let lower = k.to_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                        (k.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (k.clone(), redact_sensitive(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive).collect()),
        other => other.clone(),
    }
}
