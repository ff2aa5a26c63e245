//! Welcome module — landing endpoint with application metadata.

use serde_json::json;

use super::Module;
use crate::router::{ConfigError, Router};
use crate::{Response, StatusCode};

/// Serves `GET /` with basic application information.
pub struct WelcomeModule;

impl Module for WelcomeModule {
    fn name(&self) -> &'static str {
        "welcome"
    }

    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        router.get("/", |_ctx| async {
            Response::json(
                StatusCode::Ok,
                &json!({
                    "name": "modulith",
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "ok",
                }),
            )
        })
    }
}
