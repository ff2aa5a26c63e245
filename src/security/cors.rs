//! CORS middleware — validates the `Origin` header, handles preflight
//! requests, and injects `Access-Control-*` headers on actual responses.

use std::pin::Pin;

use crate::{
    Response,
    config::CorsConfig,
    context::Context,
    middleware::{Middleware, Next},
};

/// Cross-Origin Resource Sharing middleware.
///
/// Constructed via [`CorsMiddleware::new`] and further configured through
/// the builder methods, or built in one step from a deserialized
/// [`CorsConfig`] with [`from_config`](Self::from_config).
///
/// # Behavior
///
/// - When disabled, or when no `Origin` header is present, or when the
///   origin is not in the allow-list, the request passes through unmodified.
/// - `OPTIONS` preflight requests from an allowed origin are short-circuited
///   with `204 No Content` and the `Access-Control-Allow-*` headers; the
///   downstream handler is **not** called.
/// - For all other requests the handler runs normally and the CORS headers
///   are appended to its response.
/// - When the wildcard origin `"*"` is used without credentials, responses
///   carry `Access-Control-Allow-Origin: *` and no `Vary: Origin`. Whenever
///   a specific origin is echoed back (including wildcard + credentials,
///   where `*` is not a legal value), `Vary: Origin` is added.
///
/// # Examples
///
/// ```rust,no_run
/// use modulith::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .allow_origin("https://example.com")
///     .allow_method("PATCH")
///     .allow_header("X-Custom-Header");
/// ```
pub struct CorsMiddleware {
    enabled: bool,
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
    allow_credentials: bool,
    max_age: u32,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Creates a new `CorsMiddleware` with permissive defaults:
    /// all origins (`*`), common methods, and common headers.
    pub fn new() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "PATCH".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-Requested-With".to_string(),
            ],
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: 86_400,
        }
    }

    /// Builds a middleware from already-parsed configuration values.
    pub fn from_config(config: CorsConfig) -> Self {
        Self {
            enabled: config.enabled,
            allowed_origins: config.allowed_origins,
            allowed_methods: config.allowed_methods,
            allowed_headers: config.allowed_headers,
            exposed_headers: config.exposed_headers,
            allow_credentials: config.allow_credentials,
            max_age: config.max_age,
        }
    }

    /// Adds an allowed origin. Pass `"*"` to permit all origins.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    /// Adds an allowed HTTP method, sent verbatim in
    /// `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.allowed_methods.push(method.into());
        self
    }

    /// Adds an allowed request header, sent verbatim in
    /// `Access-Control-Allow-Headers`.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.allowed_headers.push(header.into());
        self
    }

    /// Adds a response header exposed to cross-origin JavaScript via
    /// `Access-Control-Expose-Headers`.
    #[must_use]
    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        self.exposed_headers.push(header.into());
        self
    }

    /// Enables `Access-Control-Allow-Credentials: true`.
    #[must_use]
    pub fn allow_credentials(mut self) -> Self {
        self.allow_credentials = true;
        self
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let enabled = self.enabled;
        let allowed_origins = self.allowed_origins.clone();
        let allowed_methods = self.allowed_methods.clone();
        let allowed_headers = self.allowed_headers.clone();
        let exposed_headers = self.exposed_headers.clone();
        let allow_credentials = self.allow_credentials;
        let max_age = self.max_age;

        Box::pin(async move {
            if !enabled {
                return next.run(ctx).await;
            }

            let request_origin = ctx.request().headers().get("origin").map(str::to_owned);
            let is_preflight = ctx.request().method() == &crate::Method::Options;
            let Some(origin) = request_origin else {
                return next.run(ctx).await;
            };

            let wildcard_allowed = allowed_origins.iter().any(|o| o == "*");
            let allow_origin = if wildcard_allowed && !allow_credentials {
                "*".to_owned()
            } else if wildcard_allowed || allowed_origins.contains(&origin) {
                // Credentials may not be combined with `*`, so echo the
                // concrete origin instead.
                origin.clone()
            } else {
                return next.run(ctx).await;
            };

            let methods_str = allowed_methods.join(", ");
            let headers_str = allowed_headers.join(", ");
            let is_wildcard = allow_origin == "*";

            if is_preflight {
                let mut resp = Response::new(crate::StatusCode::NoContent)
                    .header("Access-Control-Allow-Origin", &allow_origin)
                    .header("Access-Control-Allow-Methods", &methods_str)
                    .header("Access-Control-Allow-Headers", &headers_str)
                    .header("Access-Control-Max-Age", max_age.to_string());
                if allow_credentials {
                    resp.add_header("Access-Control-Allow-Credentials", "true");
                }
                if !is_wildcard {
                    resp.add_header("Vary", "Origin");
                }
                return resp;
            }

            let mut resp = next.run(ctx).await;
            resp.add_header("Access-Control-Allow-Origin", &allow_origin);
            resp.add_header("Access-Control-Allow-Methods", &methods_str);
            resp.add_header("Access-Control-Allow-Headers", &headers_str);
            if allow_credentials {
                resp.add_header("Access-Control-Allow-Credentials", "true");
            }
            if !exposed_headers.is_empty() {
                resp.add_header("Access-Control-Expose-Headers", exposed_headers.join(", "));
            }
            if !is_wildcard {
                resp.add_header("Vary", "Origin");
            }
            resp
        })
    }
}
