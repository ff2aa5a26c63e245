//! Docs module — documentation index and per-page lookup.

use serde_json::json;

use super::Module;
use crate::context::Context;
use crate::router::{ConfigError, Router};
use crate::{Response, StatusCode};

// Slugs the viewer knows about. A real deployment would scan a content
// directory; the skeleton ships a fixed index.
const PAGES: &[(&str, &str)] = &[
    ("quick-start", "Quick Start"),
    ("routing", "Routing"),
    ("middleware", "Middleware"),
];

/// Serves `GET /docs` (index) and `GET /docs/{slug}` (single page).
pub struct DocsModule;

impl Module for DocsModule {
    fn name(&self) -> &'static str {
        "docs"
    }

    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        router.get("/docs", |_ctx| async {
            let pages: Vec<_> = PAGES
                .iter()
                .map(|(slug, title)| json!({ "slug": slug, "title": title }))
                .collect();
            Response::json(StatusCode::Ok, &json!({ "pages": pages }))
        })?;

        router.get("/docs/{slug}", |ctx: Context| async move {
            let slug = ctx.params().get("slug").unwrap_or("").to_owned();
            match PAGES.iter().find(|(s, _)| *s == slug) {
                Some((slug, title)) => Response::json(
                    StatusCode::Ok,
                    &json!({ "slug": slug, "title": title }),
                ),
                None => Response::json(
                    StatusCode::NotFound,
                    &json!({
                        "error": "Not Found",
                        "message": format!("No documentation page named `{slug}`"),
                    }),
                ),
            }
        })?;

        Ok(())
    }
}
