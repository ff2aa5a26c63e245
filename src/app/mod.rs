//! The application — composition root and per-request dispatcher.
//!
//! [`App`] wires the frozen route table, the ordered middleware list, and
//! the fault boundary together. Assembly happens once at startup through
//! [`AppBuilder`]: modules register their routes, middleware is added as a
//! statically typed ordered list (no string-keyed lookup at request time),
//! and [`AppBuilder::build`] freezes the route table before any request is
//! served.
//!
//! Per request, [`App::dispatch`] runs the middleware chain around a
//! terminal that resolves the route and invokes its handler. Expected misses
//! come back as values from the router and become plain `404`/`405`
//! responses; only genuinely unexpected handler faults (panics) cross the
//! dispatch boundary, where they are caught exactly once, logged, and
//! converted to a `500`.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, RequestLogger, from_middleware};
use crate::modules::Module;
use crate::router::{ConfigError, RouteMatch, Router};
use crate::security::{CorsMiddleware, RateLimitMiddleware};
use crate::{Request, Response, StatusCode};

struct Inner {
    router: Router,
    middlewares: Vec<MiddlewareHandler>,
    debug: bool,
}

/// Startup-time assembly of routes and middleware.
///
/// Created by [`App::builder`]. Routes and middleware may only be added
/// here; [`build`](Self::build) freezes the route table, after which
/// registration fails with [`ConfigError::Frozen`].
pub struct AppBuilder {
    router: Router,
    middlewares: Vec<MiddlewareHandler>,
    debug: bool,
}

impl AppBuilder {
    /// Register a feature module's routes.
    pub fn module(mut self, module: &dyn Module) -> Result<Self, ConfigError> {
        debug!(module = module.name(), "registering module routes");
        module.register(&mut self.router)?;
        Ok(self)
    }

    /// Append a middleware to the pipeline. The first middleware added is
    /// outermost.
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Grant direct access to the router for ad-hoc route registration.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Include fault detail in `500` responses.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Install the standard middleware stack — CORS, request logging, rate
    /// limiting, in that order — from already-parsed configuration values.
    pub fn standard_middleware(mut self, config: &AppConfig) -> Self {
        self.debug = config.debug;
        if config.cors.enabled {
            self = self.middleware(CorsMiddleware::from_config(config.cors.clone()));
        }
        if config.log_requests {
            self = self.middleware(RequestLogger);
        }
        if config.rate_limit.enabled {
            self = self.middleware(RateLimitMiddleware::new(
                config.rate_limit.max_requests,
                std::time::Duration::from_secs(config.rate_limit.window_seconds),
            ));
        }
        self
    }

    /// Freeze the route table and produce the shareable [`App`].
    pub fn build(mut self) -> App {
        self.router.freeze();
        App {
            inner: Arc::new(Inner {
                router: self.router,
                middlewares: self.middlewares,
                debug: self.debug,
            }),
        }
    }
}

/// The assembled application. Cheap to clone; all state is behind an `Arc`.
///
/// # Examples
///
/// ```rust,no_run
/// use modulith::{App, Response, StatusCode, config::AppConfig};
///
/// # fn main() -> Result<(), modulith::ConfigError> {
/// let mut builder = App::builder().standard_middleware(&AppConfig::default());
/// builder.router_mut().get("/ping", |_ctx| async {
///     Response::new(StatusCode::Ok).body("pong")
/// })?;
/// let app = builder.build();
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

impl App {
    /// Start assembling an application.
    pub fn builder() -> AppBuilder {
        AppBuilder {
            router: Router::new(),
            middlewares: Vec::new(),
            debug: false,
        }
    }

    /// Dispatch one parsed request through the middleware pipeline to its
    /// route handler and return the response.
    ///
    /// This is the outermost fault boundary: the pipeline runs in its own
    /// task, and a panicking handler surfaces as a task failure that is
    /// logged and converted to a `500` here — never silently swallowed,
    /// never retried. The panic payload is included in the response body
    /// only when the debug flag is set.
    pub async fn dispatch(&self, request: Request) -> Response {
        let inner = Arc::clone(&self.inner);

        let pipeline = tokio::spawn(async move {
            let mut chain = inner.middlewares.clone();
            chain.push(terminal(Arc::clone(&inner)));
            Next::new(chain).run(Context::new(request)).await
        });

        match pipeline.await {
            Ok(response) => response,
            Err(join_err) => {
                let detail = panic_detail(join_err);
                error!(detail = %detail, "handler fault — returning 500");
                let message = if self.inner.debug {
                    detail
                } else {
                    "An unexpected error occurred.".to_owned()
                };
                Response::json(
                    StatusCode::InternalServerError,
                    &json!({
                        "error": "Internal Server Error",
                        "message": message,
                    }),
                )
            }
        }
    }
}

// The innermost link of the chain: resolve the route and invoke its handler.
fn terminal(inner: Arc<Inner>) -> MiddlewareHandler {
    Arc::new(move |mut ctx: Context, _next: Next| {
        let inner = Arc::clone(&inner);
        Box::pin(async move {
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_owned();

            match inner.router.find(&method, &path) {
                RouteMatch::Matched { handler, params } => {
                    ctx.set_params(params);
                    handler(ctx).await
                }
                RouteMatch::NotFound => Response::json(
                    StatusCode::NotFound,
                    &json!({
                        "error": "Not Found",
                        "message": format!("No route matches {method} {path}"),
                    }),
                ),
                RouteMatch::MethodNotAllowed { allowed } => {
                    let allow = allowed
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    Response::json(
                        StatusCode::MethodNotAllowed,
                        &json!({
                            "error": "Method Not Allowed",
                            "message": format!("{method} is not supported for {path}"),
                        }),
                    )
                    .header("Allow", allow)
                }
            }
        })
    })
}

// Best-effort extraction of a panic payload from a failed dispatch task.
fn panic_detail(err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            format!("handler panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("handler panicked: {s}")
        } else {
            "handler panicked".to_owned()
        }
    } else {
        "dispatch task cancelled".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn demo_app() -> App {
        let mut builder = App::builder();
        let router = builder.router_mut();
        router
            .get("/docs/{slug}", |ctx: Context| async move {
                let slug = ctx.params().get("slug").unwrap_or("").to_owned();
                Response::json(StatusCode::Ok, &json!({ "slug": slug }))
            })
            .unwrap();
        router
            .get("/docs/health", |_ctx| async {
                Response::json(StatusCode::Ok, &json!({ "literal": true }))
            })
            .unwrap();
        router
            .get("/auth/me", |_ctx| async { Response::new(StatusCode::Ok) })
            .unwrap();
        builder.build()
    }

    #[tokio::test]
    async fn matched_route_receives_params() {
        let response = demo_app()
            .dispatch(make_request("GET", "/docs/quick-start"))
            .await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_ref(), br#"{"slug":"quick-start"}"#);
    }

    #[tokio::test]
    async fn literal_route_preferred_over_param_route() {
        let response = demo_app()
            .dispatch(make_request("GET", "/docs/health"))
            .await;
        assert_eq!(response.body_ref(), br#"{"literal":true}"#);
    }

    #[tokio::test]
    async fn unknown_path_yields_404() {
        let response = demo_app().dispatch(make_request("GET", "/unknown")).await;
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_yields_405_with_allow() {
        let response = demo_app().dispatch(make_request("POST", "/auth/me")).await;
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(response.headers().get("allow"), Some("GET"));
    }

    #[tokio::test]
    async fn panicking_handler_becomes_generic_500() {
        let mut builder = App::builder();
        builder
            .router_mut()
            .get("/boom", |_ctx| async {
                if true {
                    panic!("kaboom");
                }
                Response::new(StatusCode::Ok)
            })
            .unwrap();
        let app = builder.build();

        let response = app.dispatch(make_request("GET", "/boom")).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        let body = String::from_utf8(response.body_ref().to_vec()).unwrap();
        assert!(!body.contains("kaboom"), "production body must stay generic");
    }

    #[tokio::test]
    async fn debug_mode_exposes_panic_payload() {
        let mut builder = App::builder().debug(true);
        builder
            .router_mut()
            .get("/boom", |_ctx| async {
                if true {
                    panic!("kaboom");
                }
                Response::new(StatusCode::Ok)
            })
            .unwrap();
        let app = builder.build();

        let response = app.dispatch(make_request("GET", "/boom")).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        let body = String::from_utf8(response.body_ref().to_vec()).unwrap();
        assert!(body.contains("kaboom"));
    }

    #[tokio::test]
    async fn middleware_wraps_dispatch_in_order() {
        struct Tag {
            name: &'static str,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Middleware for Tag {
            fn handle(
                &self,
                ctx: Context,
                next: Next,
            ) -> std::pin::Pin<Box<dyn Future<Output = Response> + Send>> {
                let name = self.name;
                let log = Arc::clone(&self.log);
                Box::pin(async move {
                    log.lock().unwrap().push(name);
                    let response = next.run(ctx).await;
                    log.lock().unwrap().push(name);
                    response
                })
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut builder = App::builder()
            .middleware(Tag {
                name: "outer",
                log: Arc::clone(&log),
            })
            .middleware(Tag {
                name: "inner",
                log: Arc::clone(&log),
            });
        builder
            .router_mut()
            .get("/", |_ctx| async { Response::new(StatusCode::Ok) })
            .unwrap();
        let app = builder.build();

        app.dispatch(make_request("GET", "/")).await;
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner", "inner", "outer"]);
    }

    #[tokio::test]
    async fn standard_stack_attaches_rate_limit_headers() {
        let config = AppConfig {
            rate_limit: crate::config::RateLimitConfig {
                enabled: true,
                max_requests: 10,
                window_seconds: 60,
            },
            ..AppConfig::default()
        };
        let mut builder = App::builder().standard_middleware(&config);
        builder
            .router_mut()
            .get("/", |_ctx| async { Response::new(StatusCode::Ok) })
            .unwrap();
        let app = builder.build();

        let response = app.dispatch(make_request("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.headers().get("x-ratelimit-limit"), Some("10"));
        assert_eq!(response.headers().get("x-ratelimit-remaining"), Some("9"));
    }

    #[tokio::test]
    async fn rate_limited_dispatch_skips_handler() {
        let config = AppConfig {
            rate_limit: crate::config::RateLimitConfig {
                enabled: true,
                max_requests: 1,
                window_seconds: 60,
            },
            log_requests: false,
            ..AppConfig::default()
        };
        let hits = Arc::new(Mutex::new(0u32));
        let hits_clone = Arc::clone(&hits);

        let mut builder = App::builder().standard_middleware(&config);
        builder
            .router_mut()
            .get("/", move |_ctx| {
                let hits = Arc::clone(&hits_clone);
                async move {
                    *hits.lock().unwrap() += 1;
                    Response::new(StatusCode::Ok)
                }
            })
            .unwrap();
        let app = builder.build();

        assert_eq!(app.dispatch(make_request("GET", "/")).await.status(), StatusCode::Ok);
        assert_eq!(
            app.dispatch(make_request("GET", "/")).await.status(),
            StatusCode::TooManyRequests
        );
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
