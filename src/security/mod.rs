//! Security middleware — CORS and in-memory rate limiting.
//!
//! Both middlewares are plain [`Middleware`](crate::middleware::Middleware)
//! implementations assembled by the composition root at startup; neither
//! reads configuration files or environment variables itself.

pub mod cors;
pub mod rate_limit;

pub use cors::CorsMiddleware;
pub use rate_limit::RateLimitMiddleware;
