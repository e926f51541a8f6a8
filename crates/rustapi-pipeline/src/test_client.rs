//! TestClient for driving a pipeline without network binding
//!
//! # Example
//!
//! ```rust,ignore
//! use rustapi_pipeline::{Pipeline, TestClient, TestRequest};
//!
//! #[tokio::test]
//! async fn test_hello() {
//!     let pipeline = Pipeline::new().handler(|_req| async { "Hello, World!" });
//!     let client = TestClient::new(pipeline);
//!
//!     let response = client.request(TestRequest::post("/").cookie("session", "abc")).await;
//!     response.assert_status(200);
//!     assert_eq!(response.text(), "Hello, World!");
//! }
//! ```

use crate::pipeline::Pipeline;
use crate::response::Response;
use bytes::Bytes;
use cookie::Cookie;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Test client sending simulated requests through a [`Pipeline`]
#[derive(Clone)]
pub struct TestClient {
    pipeline: Arc<Pipeline>,
}

impl TestClient {
    /// Create a new test client
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Send a POST request without headers, cookies or body
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request(TestRequest::post(path)).await
    }

    /// Send a request with full control
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let uri: http::Uri = req.path.parse().unwrap_or_else(|_| http::Uri::from_static("/"));
        let mut builder = http::Request::builder().method(req.method).uri(uri);

        if let Some(headers) = builder.headers_mut() {
            headers.extend(req.headers);
            if !req.cookies.is_empty() {
                let cookie_header = req
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                if let Ok(value) = HeaderValue::from_str(&cookie_header) {
                    headers.append(header::COOKIE, value);
                }
            }
        }

        let http_req = builder
            .body(Bytes::new())
            .expect("test request should be valid");

        let response = self.pipeline.dispatch(http_req).await;
        TestResponse::from_response(response).await
    }
}

/// Test request builder
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
}

impl TestRequest {
    /// Create a request with any method
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
        }
    }

    /// Create a GET request
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a DELETE request
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a header, replacing earlier values with the same name
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Add another value for a header, keeping earlier ones
    pub fn append_header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            self.headers.append(name, val);
        }
        self
    }

    /// Send a cookie with the request
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Send every cookie a previous response set
    pub fn cookies_from(mut self, response: &TestResponse) -> Self {
        for cookie in response.set_cookies() {
            self.cookies
                .push((cookie.name().to_string(), cookie.value().to_string()));
        }
        self
    }
}

/// Test response with assertion helpers
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    async fn from_response(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map(|b| b.to_bytes())
            .unwrap_or_default();

        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Get the response status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response body as bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Every cookie set by the response, in header order
    pub fn set_cookies(&self) -> Vec<Cookie<'static>> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .collect()
    }

    /// A cookie set by the response
    pub fn cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.set_cookies()
            .into_iter()
            .find(|cookie| cookie.name() == name)
    }

    /// Assert that the response has the expected status code
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }
}
