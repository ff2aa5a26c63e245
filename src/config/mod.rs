//! Application configuration as plain data.
//!
//! These structs mirror the values an external configuration loader hands to
//! the composition root: already-parsed primitives, nothing more. The core
//! never reads environment variables or files itself — deserialize these
//! with whatever source the embedding application prefers and pass them to
//! [`App::builder`](crate::app::App).

use serde::Deserialize;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Include fault detail (panic payloads) in `500` responses.
    pub debug: bool,
    /// Install the request-logging middleware.
    pub log_requests: bool,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_requests: true,
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds (`Access-Control-Max-Age`).
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: vec![
                "GET".to_owned(),
                "POST".to_owned(),
                "PUT".to_owned(),
                "PATCH".to_owned(),
                "DELETE".to_owned(),
                "OPTIONS".to_owned(),
            ],
            allowed_headers: vec![
                "Content-Type".to_owned(),
                "Authorization".to_owned(),
                "X-Requested-With".to_owned(),
            ],
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: 86_400,
        }
    }
}

/// Fixed-window rate limit parameters, fixed at process start.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 60,
            window_seconds: 60,
        }
    }
}
