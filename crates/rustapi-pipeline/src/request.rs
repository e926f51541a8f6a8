//! Request types for the pipeline

use crate::cookies::Cookies;
use http::{request::Parts, Extensions, HeaderMap, Method};
use std::sync::Arc;

/// HTTP Request wrapper
///
/// Provides the head of an incoming HTTP request along with the values plugins
/// published into the pipeline's shared state. Guards and handlers in this
/// pipeline act on the head only, so the body is not carried.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) state: Arc<Extensions>,
}

impl Request {
    /// Create a new request from parts
    pub(crate) fn new(parts: Parts, state: Arc<Extensions>) -> Self {
        Self { parts, state }
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Cookies parsed by the [`CookieParser`](crate::CookieParser) plugin.
    ///
    /// Returns `None` when the plugin has not run for this request.
    pub fn cookies(&self) -> Option<&Cookies> {
        self.parts.extensions.get::<Cookies>()
    }

    /// Get shared state published by plugins
    pub fn state(&self) -> &Arc<Extensions> {
        &self.state
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .finish()
    }
}
