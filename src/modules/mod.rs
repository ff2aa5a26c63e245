//! Feature modules — self-contained route bundles registered at startup.
//!
//! A [`Module`] owns a group of related endpoints and registers them into
//! the router before the table is frozen. Modules keep endpoint wiring out
//! of the composition root: the application assembles a list of modules and
//! calls [`AppBuilder::module`](crate::app::AppBuilder::module) for each.
//!
//! The built-in modules respond with static JSON; they exist to give a
//! fresh application a working skeleton (landing info, health check, auth
//! stubs, docs endpoints), not to be production features.

use crate::router::{ConfigError, Router};

pub mod api_docs;
pub mod auth;
pub mod docs;
pub mod health;
pub mod welcome;

pub use api_docs::ApiDocsModule;
pub use auth::AuthModule;
pub use docs::DocsModule;
pub use health::HealthModule;
pub use welcome::WelcomeModule;

/// A bundle of routes registered together at startup.
pub trait Module: Send + Sync {
    /// Short identifier used in startup logs.
    fn name(&self) -> &'static str;

    /// Register this module's routes. Called once, before the route table
    /// is frozen.
    fn register(&self, router: &mut Router) -> Result<(), ConfigError>;
}

/// The default module set for a fresh application skeleton.
pub fn default_modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(WelcomeModule),
        Box::new(HealthModule),
        Box::new(AuthModule),
        Box::new(DocsModule),
        Box::new(ApiDocsModule),
    ]
}
