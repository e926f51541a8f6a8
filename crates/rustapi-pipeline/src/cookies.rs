//! Cookie parsing and pending `Set-Cookie` bookkeeping.

use crate::error::PipelineError;
use crate::middleware::{BoxedNext, MiddlewareLayer};
use crate::plugin::{Plugin, Registrar};
use crate::request::Request;
use crate::response::Response;
use cookie::Cookie;
use http::{header, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Cookies sent with a request, keyed by name.
///
/// When a name appears more than once only its first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    /// Parse every `Cookie` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = HashMap::new();

        let raw_headers = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok());

        for raw in raw_headers {
            for cookie in Cookie::split_parse(raw).filter_map(|c| c.ok()) {
                values
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }

        Self { values }
    }

    /// Get the value of a cookie
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Check whether a cookie was sent
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of distinct cookies
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the request carried no cookies at all
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cookies waiting to be written onto a response.
///
/// Setting a cookie whose name is already pending replaces the earlier one, so
/// a response never carries two `Set-Cookie` headers for the same name.
#[derive(Debug, Clone, Default)]
pub struct SetCookies {
    pending: Vec<Cookie<'static>>,
}

impl SetCookies {
    /// Create an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cookie, replacing any pending cookie with the same name.
    pub fn set(&mut self, cookie: Cookie<'static>) {
        self.pending.retain(|pending| pending.name() != cookie.name());
        self.pending.push(cookie);
    }

    /// Get a pending cookie by name
    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.pending.iter().find(|cookie| cookie.name() == name)
    }

    /// Iterate over pending cookies in the order they were set
    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.pending.iter()
    }

    /// Number of pending cookies
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Append one `Set-Cookie` header per pending cookie.
    pub fn apply(self, response: &mut Response) {
        for cookie in self.pending {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(_) => {
                    tracing::warn!(cookie = %cookie.name(), "dropping cookie that is not a valid header value");
                }
            }
        }
    }
}

/// Plugin that parses request cookies into [`Cookies`].
///
/// Plugins that read cookies declare a dependency on [`CookieParser::NAME`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieParser;

impl CookieParser {
    /// Registration name of the plugin
    pub const NAME: &'static str = "rustapi-cookies";
}

impl Plugin for CookieParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn register(self, registrar: &mut Registrar<'_>) -> Result<(), PipelineError> {
        registrar.layer(CookieParserLayer);
        Ok(())
    }
}

#[derive(Clone)]
struct CookieParserLayer;

impl MiddlewareLayer for CookieParserLayer {
    fn call(
        &self,
        mut req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let cookies = Cookies::from_headers(req.headers());
        req.extensions_mut().insert(cookies);
        next(req)
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}
