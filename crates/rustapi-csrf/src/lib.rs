//! # rustapi-csrf
//!
//! Double-submit cookie CSRF protection for RustAPI pipelines.
//!
//! Every response that lacks a cookie pair gets one: a token cookie readable by
//! page scripts and an `HttpOnly` checksum cookie holding an HMAC of the token.
//! State-changing requests must echo the token in one of the
//! [`TOKEN_HEADERS`]; a request whose token does not verify is rejected with
//! `400 Bad Request` and receives a fresh pair, so its retry can succeed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rustapi_csrf::{CsrfConfig, CsrfPlugin};
//! use rustapi_pipeline::{CookieParser, Pipeline};
//!
//! # fn main() -> Result<(), rustapi_pipeline::PipelineError> {
//! let pipeline = Pipeline::new()
//!     .register(CookieParser)?
//!     .register(CsrfPlugin::new(CsrfConfig::new("change me")))?
//!     .handler(|_req| async { "ok" });
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`CsrfConfig`] can be built in code, deserialized with serde, or read from
//! `CSRF_*` environment variables with [`CsrfConfig::from_env`].

mod config;
mod error;
mod guard;
mod layer;
mod plugin;
mod token;

pub use config::{
    CookieOptions, CsrfConfig, ReissuePolicy, SameSitePolicy, DEFAULT_CHECKSUM_KEY,
    DEFAULT_ERROR_MESSAGE, DEFAULT_IGNORE_METHODS, DEFAULT_TOKEN_KEY,
};
pub use error::{CsrfError, Result};
pub use guard::{CsrfGuard, CsrfRequest, RejectReason, Rejection, Verdict, TOKEN_HEADERS};
pub use layer::{CsrfCheck, CsrfLayer, CsrfValidator};
pub use plugin::CsrfPlugin;
pub use token::{Checksum, CsrfToken, HmacSha256, Secret, TokenCrypto, DEFAULT_TOKEN_LENGTH};
