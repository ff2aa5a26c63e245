//! Health module — liveness endpoint for load balancers and monitors.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use super::Module;
use crate::router::{ConfigError, Router};
use crate::{Response, StatusCode};

/// Serves `GET /health` with a status summary.
pub struct HealthModule;

impl Module for HealthModule {
    fn name(&self) -> &'static str {
        "health"
    }

    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        router.get("/health", |_ctx| async {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            Response::json(
                StatusCode::Ok,
                &json!({
                    "status": "ok",
                    "timestamp": timestamp,
                }),
            )
        })
    }
}
