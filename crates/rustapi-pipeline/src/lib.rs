//! # RustAPI Pipeline
//!
//! The request pipeline RustAPI plugins are installed into.
//!
//! A [`Pipeline`] owns a stack of [`MiddlewareLayer`]s, a final handler and a
//! registration context. Plugins are registered through [`Pipeline::register`],
//! which rejects a second registration of the same plugin and refuses plugins
//! whose declared dependencies have not been installed yet.
//!
//! # Example
//!
//! ```rust,ignore
//! use rustapi_pipeline::{CookieParser, Pipeline};
//!
//! let pipeline = Pipeline::new()
//!     .register(CookieParser)?
//!     .handler(|_req| async { "Hello, World!" });
//! ```

#![warn(missing_docs)]

mod cookies;
mod error;
pub mod middleware;
mod pipeline;
mod plugin;
mod request;
mod response;
#[cfg(any(test, feature = "test-utils"))]
mod test_client;

// Public API
pub use cookies::{CookieParser, Cookies, SetCookies};
pub use error::{ApiError, BoxError, PipelineError, Result};
pub use middleware::{BoxedNext, LayerStack, MiddlewareLayer};
pub use pipeline::Pipeline;
pub use plugin::{Plugin, Registrar};
pub use request::Request;
pub use response::{IntoResponse, Response};
#[cfg(any(test, feature = "test-utils"))]
pub use test_client::{TestClient, TestRequest, TestResponse};
