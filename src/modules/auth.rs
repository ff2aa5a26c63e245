//! Auth module — placeholder endpoints for a future authentication layer.
//!
//! These are stubs: they define the route surface (`/auth/*`) without any
//! credential or session logic, so that clients can be built against the
//! final URL layout before authentication lands.

use serde_json::json;

use super::Module;
use crate::router::{ConfigError, Router};
use crate::{Response, StatusCode};

/// Registers the `/auth/*` stub endpoints.
pub struct AuthModule;

fn stub(status: StatusCode, endpoint: &str) -> Response {
    Response::json(
        status,
        &json!({
            "message": format!("{endpoint} endpoint - to be implemented"),
            "status": "ok",
        }),
    )
}

impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        router.post("/auth/register", |_ctx| async {
            stub(StatusCode::Created, "Registration")
        })?;
        router.post("/auth/login", |_ctx| async { stub(StatusCode::Ok, "Login") })?;
        router.post("/auth/logout", |_ctx| async { stub(StatusCode::Ok, "Logout") })?;
        router.get("/auth/me", |_ctx| async {
            stub(StatusCode::Ok, "Current user")
        })?;
        Ok(())
    }
}
