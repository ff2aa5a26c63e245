//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! This module provides [`Router`], a route table that binds
//! `(method, pattern)` pairs to handler functions and resolves incoming
//! requests against them. Patterns are slash-separated sequences of literal
//! segments and named parameter segments:
//!
//! | Pattern              | Example match       | Captured params        |
//! |----------------------|---------------------|------------------------|
//! | `/docs`              | `/docs`             | *(none)*               |
//! | `/docs/{slug}`       | `/docs/quick-start` | `slug → "quick-start"` |
//!
//! There are no wildcard or regex segments; a parameter always captures
//! exactly one non-empty path segment as an opaque string.
//!
//! Leading and trailing slashes are ignored on both patterns and incoming
//! paths. When several patterns match the same path for the same method, the
//! one with fewer parameter segments wins (`/docs/health` beats
//! `/docs/{slug}`); equal specificity falls back to registration order.
//!
//! Lookup reports its outcome as a value — [`RouteMatch`] — rather than an
//! error: a path that matches no pattern is `NotFound`, and a path that
//! matches under a different method is `MethodNotAllowed` with the set of
//! methods that would have matched, so the dispatcher can answer `405` with
//! a correct `Allow` header instead of a blanket `404`.
//!
//! Registration is a startup-only activity: once [`Router::freeze`] is
//! called the table is read-only and further `add_route` calls fail with
//! [`ConfigError::Frozen`]. Frozen lookups need no synchronization.

use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::context::{Context, PathParams};
use crate::{Method, Response};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and
/// returns a [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and
/// shared across threads without copying the underlying closure.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the
/// blanket impl below. Router methods accept `impl IntoHandler` so the
/// two-type-parameter where-bound does not need to be repeated at every
/// call site.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Route registration errors. Fatal at startup, never raised at request time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The pattern string is malformed (unbalanced braces, empty segment,
    /// empty parameter name).
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// A structurally identical pattern is already registered for this
    /// method. Parameter names do not disambiguate: `/a/{x}` and `/a/{y}`
    /// collide.
    #[error("duplicate route: {method} `{pattern}` is already registered")]
    DuplicateRoute { method: Method, pattern: String },

    /// The table has been frozen; all routes must be registered before
    /// serving begins.
    #[error("route table is frozen; routes must be registered before serving begins")]
    Frozen,
}

// A single path segment of a compiled pattern.
#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    param_count: usize,
}

impl Pattern {
    /// Parse and validate a pattern string.
    ///
    /// `/` compiles to zero segments (the root). A segment of the form
    /// `{name}` is a parameter; anything else is a literal. A brace anywhere
    /// other than wrapping a whole segment is rejected.
    fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason,
        };

        let trimmed = pattern.trim_matches('/');
        let mut segments = Vec::new();
        let mut param_count = 0;

        if !trimmed.is_empty() {
            for seg in trimmed.split('/') {
                if seg.is_empty() {
                    return Err(invalid("empty path segment"));
                }

                if let Some(inner) = seg.strip_prefix('{') {
                    let Some(name) = inner.strip_suffix('}') else {
                        return Err(invalid("unbalanced parameter braces"));
                    };
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if name.contains(['{', '}']) {
                        return Err(invalid("unbalanced parameter braces"));
                    }
                    segments.push(Segment::Param(name.to_owned()));
                    param_count += 1;
                } else {
                    if seg.contains(['{', '}']) {
                        return Err(invalid("unbalanced parameter braces"));
                    }
                    segments.push(Segment::Literal(seg.to_owned()));
                }
            }
        }

        Ok(Self {
            raw: pattern.to_owned(),
            segments,
            param_count,
        })
    }

    // Structural identity: same shape, literals equal, parameter names ignored.
    fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    // Match against pre-split path segments, capturing parameters on success.
    fn matches(&self, path_segments: &[&str]) -> Option<PathParams> {
        if self.segments.len() != path_segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (seg, path_seg) in self.segments.iter().zip(path_segments) {
            match seg {
                Segment::Literal(lit) => {
                    if lit != path_seg {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*path_seg).to_owned());
                }
            }
        }

        Some(params)
    }
}

// A single registered route binding a method + pattern to a handler.
struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// The outcome of resolving `(method, path)` against the route table.
///
/// Expected misses are values, not errors: the dispatcher turns `NotFound`
/// into a `404` and `MethodNotAllowed` into a `405` with an `Allow` header.
pub enum RouteMatch<'a> {
    /// A route matched; invoke `handler` with `params` attached to the context.
    Matched {
        handler: &'a Handler,
        params: PathParams,
    },
    /// No pattern matches this path under any method.
    NotFound,
    /// The path matches one or more patterns, but none under this method.
    /// `allowed` lists the methods that would have matched, in registration
    /// order without duplicates.
    MethodNotAllowed { allowed: Vec<Method> },
}

/// Route table: registration at startup, read-only matching after freeze.
///
/// # Examples
///
/// ```
/// use modulith::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
///
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) })?;
///
/// router.get("/docs/{slug}", |ctx: modulith::Context| async move {
///     let slug = ctx.params().get("slug").unwrap_or("unknown").to_owned();
///     Response::new(StatusCode::Ok).body(slug)
/// })?;
///
/// router.freeze();
/// # Ok::<(), modulith::ConfigError>(())
/// ```
pub struct Router {
    routes: Vec<Route>,
    frozen: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            frozen: false,
        }
    }

    /// Register a handler for `GET` requests matching `pattern`.
    pub fn get(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Get, pattern, handler)
    }

    /// Register a handler for `POST` requests matching `pattern`.
    pub fn post(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Post, pattern, handler)
    }

    /// Register a handler for `PUT` requests matching `pattern`.
    pub fn put(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Put, pattern, handler)
    }

    /// Register a handler for `DELETE` requests matching `pattern`.
    pub fn delete(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Delete, pattern, handler)
    }

    /// Register a handler for `PATCH` requests matching `pattern`.
    pub fn patch(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Patch, pattern, handler)
    }

    /// Register a handler for `OPTIONS` requests matching `pattern`.
    pub fn options(&mut self, pattern: &str, handler: impl IntoHandler) -> Result<(), ConfigError> {
        self.add_route(Method::Options, pattern, handler)
    }

    /// Register a binding for an arbitrary method.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Frozen`] — the table has been frozen.
    /// - [`ConfigError::InvalidPattern`] — `pattern` is malformed.
    /// - [`ConfigError::DuplicateRoute`] — a structurally identical pattern
    ///   is already registered for `method` (duplicates are rejected rather
    ///   than silently shadowed).
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl IntoHandler,
    ) -> Result<(), ConfigError> {
        if self.frozen {
            return Err(ConfigError::Frozen);
        }

        let compiled = Pattern::parse(pattern)?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.method == method && r.pattern.same_shape(&compiled))
        {
            return Err(ConfigError::DuplicateRoute {
                method,
                pattern: existing.pattern.raw.clone(),
            });
        }

        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: compiled,
            handler,
        });
        Ok(())
    }

    /// Freeze the table. Subsequent registrations fail with
    /// [`ConfigError::Frozen`]; lookups are unaffected.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` once [`freeze`](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve `(method, path)` against the table.
    ///
    /// Leading and trailing slashes on `path` are ignored; an internal empty
    /// segment (`//`) never matches anything. Among matching patterns for
    /// the method, the one with the fewest parameter segments wins; ties go
    /// to the first registered.
    pub fn find<'a>(&'a self, method: &Method, path: &str) -> RouteMatch<'a> {
        let trimmed = path.trim_matches('/');
        let path_segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        // A double slash produces an empty segment, which no pattern matches.
        if path_segments.iter().any(|s| s.is_empty()) {
            return RouteMatch::NotFound;
        }

        let mut best: Option<(&Route, PathParams)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&path_segments) else {
                continue;
            };

            if route.method == *method {
                let better = match &best {
                    Some((current, _)) => route.pattern.param_count < current.pattern.param_count,
                    None => true,
                };
                if better {
                    best = Some((route, params));
                }
            } else if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        match best {
            Some((route, params)) => RouteMatch::Matched {
                handler: &route.handler,
                params,
            },
            None if !allowed.is_empty() => RouteMatch::MethodNotAllowed { allowed },
            None => RouteMatch::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    fn ok(_ctx: Context) -> impl Future<Output = Response> + Send {
        async { Response::new(StatusCode::Ok) }
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_root() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.segments.is_empty());
    }

    #[test]
    fn pattern_parse_literal() {
        let p = Pattern::parse("/docs/health").unwrap();
        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.param_count, 0);
    }

    #[test]
    fn pattern_parse_trailing_slash_ignored() {
        let a = Pattern::parse("/docs/").unwrap();
        let b = Pattern::parse("/docs").unwrap();
        assert!(a.same_shape(&b));
    }

    #[test]
    fn pattern_parse_params() {
        let p = Pattern::parse("/users/{id}/posts/{post_id}").unwrap();
        assert_eq!(p.segments.len(), 4);
        assert_eq!(p.param_count, 2);
        assert!(matches!(&p.segments[1], Segment::Param(n) if n == "id"));
        assert!(matches!(&p.segments[3], Segment::Param(n) if n == "post_id"));
    }

    #[test]
    fn pattern_parse_unbalanced_braces() {
        for bad in ["/docs/{slug", "/docs/slug}", "/docs/{sl{ug}", "/d{o}cs"] {
            assert!(
                matches!(
                    Pattern::parse(bad),
                    Err(ConfigError::InvalidPattern { .. })
                ),
                "expected InvalidPattern for {bad}"
            );
        }
    }

    #[test]
    fn pattern_parse_empty_param_name() {
        match Pattern::parse("/docs/{}") {
            Err(ConfigError::InvalidPattern { pattern, reason }) => {
                assert_eq!(pattern, "/docs/{}");
                assert_eq!(reason, "empty parameter name");
            }
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn pattern_parse_empty_segment() {
        assert!(matches!(
            Pattern::parse("/docs//x"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    // ── registration ──────────────────────────────────────────────────────────

    #[test]
    fn duplicate_literal_route_rejected() {
        let mut router = Router::new();
        router.get("/docs", ok).unwrap();
        let err = router.get("/docs", ok).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn duplicate_param_route_rejected_despite_rename() {
        let mut router = Router::new();
        router.get("/docs/{slug}", ok).unwrap();
        let err = router.get("/docs/{name}", ok).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn same_pattern_different_methods_allowed() {
        let mut router = Router::new();
        router.get("/things", ok).unwrap();
        router.post("/things", ok).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn add_after_freeze_fails() {
        let mut router = Router::new();
        router.get("/a", ok).unwrap();
        router.freeze();
        assert!(router.is_frozen());
        assert_eq!(router.get("/b", ok), Err(ConfigError::Frozen));
        assert_eq!(router.len(), 1);
    }

    // ── find ──────────────────────────────────────────────────────────────────

    fn assert_matched<'a>(m: &'a RouteMatch<'_>) -> &'a PathParams {
        match m {
            RouteMatch::Matched { params, .. } => params,
            RouteMatch::NotFound => panic!("expected Matched, got NotFound"),
            RouteMatch::MethodNotAllowed { .. } => {
                panic!("expected Matched, got MethodNotAllowed")
            }
        }
    }

    #[test]
    fn find_literal() {
        let mut router = Router::new();
        router.get("/docs", ok).unwrap();
        assert_matched(&router.find(&Method::Get, "/docs"));
        assert_matched(&router.find(&Method::Get, "/docs/"));
        assert!(matches!(
            router.find(&Method::Get, "/other"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn find_root() {
        let mut router = Router::new();
        router.get("/", ok).unwrap();
        assert_matched(&router.find(&Method::Get, "/"));
        assert!(matches!(
            router.find(&Method::Get, "/x"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn find_extracts_params() {
        let mut router = Router::new();
        router.get("/docs/{slug}", ok).unwrap();
        let m = router.find(&Method::Get, "/docs/quick-start");
        let params = assert_matched(&m);
        assert_eq!(params.get("slug"), Some("quick-start"));
    }

    #[test]
    fn find_segment_count_must_match() {
        let mut router = Router::new();
        router.get("/users/{id}", ok).unwrap();
        assert!(matches!(
            router.find(&Method::Get, "/users"),
            RouteMatch::NotFound
        ));
        assert!(matches!(
            router.find(&Method::Get, "/users/42/extra"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn find_internal_empty_segment_never_matches() {
        let mut router = Router::new();
        router.get("/a/{x}/b", ok).unwrap();
        assert!(matches!(
            router.find(&Method::Get, "/a//b"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn literal_route_beats_param_route() {
        let mut router = Router::new();
        router.get("/docs/{slug}", ok).unwrap();
        router.get("/docs/health", ok).unwrap();

        // `/docs/health` matches both; the literal pattern must win even
        // though the parameter route was registered first.
        let m = router.find(&Method::Get, "/docs/health");
        let params = assert_matched(&m);
        assert!(params.is_empty());

        // Other slugs still go to the parameter route.
        let m = router.find(&Method::Get, "/docs/other");
        assert_eq!(assert_matched(&m).get("slug"), Some("other"));
    }

    #[test]
    fn equal_specificity_tie_goes_to_first_registered() {
        let mut router = Router::new();
        router.get("/a/{x}/b", ok).unwrap();
        router.get("/a/b/{y}", ok).unwrap();

        // `/a/b/b` matches both one-param routes; the captured parameter
        // name tells us which one won.
        let m = router.find(&Method::Get, "/a/b/b");
        let params = assert_matched(&m);
        assert_eq!(params.get("x"), Some("b"));
        assert_eq!(params.get("y"), None);
    }

    #[test]
    fn wrong_method_reports_allowed_set() {
        let mut router = Router::new();
        router.get("/auth/me", ok).unwrap();

        match router.find(&Method::Post, "/auth/me") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::Get]);
            }
            _ => panic!("expected MethodNotAllowed"),
        }
    }

    #[test]
    fn allowed_set_deduplicates_across_patterns() {
        let mut router = Router::new();
        router.get("/things/{id}", ok).unwrap();
        router.get("/things/special", ok).unwrap();
        router.delete("/things/{id}", ok).unwrap();

        match router.find(&Method::Post, "/things/special") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::Get, Method::Delete]);
            }
            _ => panic!("expected MethodNotAllowed"),
        }
    }

    #[test]
    fn unknown_path_is_not_found_not_405() {
        let mut router = Router::new();
        router.get("/auth/me", ok).unwrap();
        assert!(matches!(
            router.find(&Method::Get, "/unknown"),
            RouteMatch::NotFound
        ));
    }

    #[tokio::test]
    async fn matched_handler_is_invocable() {
        let mut router = Router::new();
        router
            .get("/users/{id}", |ctx: Context| async move {
                let id = ctx.params().get("id").unwrap_or("").to_owned();
                Response::new(StatusCode::Ok).body(id)
            })
            .unwrap();

        let raw = b"GET /users/42 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = crate::Request::parse(raw).unwrap().0;

        match router.find(&Method::Get, "/users/42") {
            RouteMatch::Matched { handler, params } => {
                let mut ctx = Context::new(request);
                ctx.set_params(params);
                let response = handler(ctx).await;
                assert_eq!(response.status(), StatusCode::Ok);
                assert_eq!(response.body_ref(), b"42");
            }
            _ => panic!("expected Matched"),
        }
    }
}
