//! # modulith
//!
//! A small modular web framework: a route table with path-template
//! matching, an ordered middleware pipeline (CORS, request logging,
//! in-memory fixed-window rate limiting), feature modules that register
//! routes at startup, and an async HTTP/1.1 transport on Tokio.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modulith::{App, Server, config::AppConfig, modules};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut builder = App::builder().standard_middleware(&AppConfig::default());
//!     for module in modules::default_modules() {
//!         builder = builder.module(module.as_ref())?;
//!     }
//!     let app = builder.build();
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server
//!         .run(move |req| {
//!             let app = app.clone();
//!             async move { app.dispatch(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod http;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod security;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use context::Context;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{ConfigError, RouteMatch, Router};
pub use server::{Server, ServerError};
