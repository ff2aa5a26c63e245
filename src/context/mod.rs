//! Per-request context — the request plus state attached during dispatch.
//!
//! The [`Request`](crate::Request) itself is immutable once dispatch begins;
//! anything added along the way (matched path parameters, middleware-provided
//! values) lives here.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::Request;

/// Type-erased request extensions map — used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value into the extensions map
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters captured from the matched route pattern.
///
/// Values are opaque strings — no type coercion or format validation is
/// applied to captured segments.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    /// Create a new empty parameter map
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a captured value
    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a captured value by parameter name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|value| value.as_str())
    }

    /// Number of captured parameters
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if no parameters were captured
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-request context handed to middleware and handlers.
pub struct Context {
    request: Request,
    params: PathParams,
    extensions: Extensions,
}

impl Context {
    /// Create a new context from a request, with no path parameters yet.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: PathParams::new(),
            extensions: Extensions::new(),
        }
    }

    /// Attach the path parameters captured by the router.
    ///
    /// Called by the dispatcher's terminal once a route has matched; the
    /// handler then reads them via [`params`](Self::params).
    pub fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Deserialize the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.request.body();
        serde_json::from_slice(body)
    }
}
