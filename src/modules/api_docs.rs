//! API docs module — machine-readable listing of the default endpoints.

use serde_json::json;

use super::Module;
use crate::router::{ConfigError, Router};
use crate::{Response, StatusCode};

/// Serves `GET /api-docs` with an endpoint summary.
pub struct ApiDocsModule;

impl Module for ApiDocsModule {
    fn name(&self) -> &'static str {
        "api-docs"
    }

    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        router.get("/api-docs", |_ctx| async {
            Response::json(
                StatusCode::Ok,
                &json!({
                    "endpoints": [
                        { "method": "GET", "path": "/", "description": "Application info" },
                        { "method": "GET", "path": "/health", "description": "Health check" },
                        { "method": "POST", "path": "/auth/register", "description": "Register (stub)" },
                        { "method": "POST", "path": "/auth/login", "description": "Login (stub)" },
                        { "method": "POST", "path": "/auth/logout", "description": "Logout (stub)" },
                        { "method": "GET", "path": "/auth/me", "description": "Current user (stub)" },
                        { "method": "GET", "path": "/docs", "description": "Documentation index" },
                        { "method": "GET", "path": "/docs/{slug}", "description": "Documentation page" },
                        { "method": "GET", "path": "/api-docs", "description": "This listing" },
                    ],
                }),
            )
        })
    }
}
