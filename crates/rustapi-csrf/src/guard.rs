//! The double-submit validation protocol.

use crate::config::{CsrfConfig, ReissuePolicy};
use crate::error::Result;
use crate::token::{CsrfToken, HmacSha256, TokenCrypto};
use http::StatusCode;
use rustapi_pipeline::{ApiError, Request, SetCookies};
use std::fmt;
use std::sync::Arc;

/// Headers a client may echo its token in, highest priority first.
pub const TOKEN_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

/// What the guard reads from an inbound request.
///
/// Implemented for [`rustapi_pipeline::Request`]. Empty strings are treated
/// the same as absent values.
pub trait CsrfRequest {
    /// The request method, if the transport reported one.
    fn request_method(&self) -> Option<&str>;

    /// Value of a cookie sent with the request.
    fn cookie_value(&self, name: &str) -> Option<&str>;

    /// First value of a header, looked up by lowercase name.
    fn header_value(&self, name: &str) -> Option<&str>;
}

impl CsrfRequest for Request {
    fn request_method(&self) -> Option<&str> {
        Some(self.method().as_str())
    }

    fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies().and_then(|cookies| cookies.get(name))
    }

    fn header_value(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Continue to the handler. Carries the token the client holds once the
    /// response's cookies are applied.
    Allow(CsrfToken),
    /// Stop the request.
    Reject(Rejection),
}

impl Verdict {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The request arrived without a cookie pair, so a new one was issued.
    CookiesReissued,
    /// The header token did not verify against the checksum cookie.
    InvalidToken,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CookiesReissued => f.write_str("cookie pair reissued"),
            RejectReason::InvalidToken => f.write_str("invalid token"),
        }
    }
}

/// A rejected request: always `400 Bad Request` with the configured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    status: StatusCode,
    message: String,
    reason: RejectReason,
}

impl Rejection {
    /// Error type of the rendered [`ApiError`].
    pub const ERROR_TYPE: &'static str = "csrf_invalid";

    fn new(message: &str, reason: RejectReason) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            reason,
        }
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Configured error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// What triggered the rejection
    pub fn reason(&self) -> RejectReason {
        self.reason
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        ApiError::new(rejection.status, Rejection::ERROR_TYPE, rejection.message)
    }
}

/// Issues cookie pairs and evaluates requests against them.
///
/// Holds only immutable configuration, so one guard is shared by every
/// concurrent request.
#[derive(Clone)]
pub struct CsrfGuard {
    config: Arc<CsrfConfig>,
    crypto: Arc<dyn TokenCrypto>,
}

impl CsrfGuard {
    /// Build a guard using HMAC-SHA256 checksums.
    pub fn new(config: CsrfConfig) -> Result<Self> {
        Self::with_crypto(config, Arc::new(HmacSha256::default()))
    }

    /// Build a guard around custom token primitives.
    pub fn with_crypto(config: CsrfConfig, crypto: Arc<dyn TokenCrypto>) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            crypto,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Generate a fresh token and queue both cookies on `cookies`.
    ///
    /// Any pair queued earlier on the same jar is replaced.
    pub fn issue(&self, cookies: &mut SetCookies) -> CsrfToken {
        let token = self.crypto.create_token();
        let checksum = self.crypto.create_checksum(&token, self.config.secret());
        let options = self.config.cookie_options();

        cookies.set(options.to_cookie(self.config.token_cookie_name(), token.as_str(), false));
        cookies.set(options.to_cookie(
            self.config.checksum_cookie_name(),
            checksum.as_str(),
            true,
        ));

        tracing::debug!(
            token_cookie = %self.config.token_cookie_name(),
            checksum_cookie = %self.config.checksum_cookie_name(),
            "issued CSRF cookie pair"
        );
        token
    }

    /// Decide whether a request may proceed.
    ///
    /// Cookies to send back are queued on `cookies` for both outcomes.
    pub fn evaluate<R>(&self, req: &R, cookies: &mut SetCookies) -> Verdict
    where
        R: CsrfRequest + ?Sized,
    {
        let token_cookie = non_empty(req.cookie_value(self.config.token_cookie_name()));
        let checksum_cookie = non_empty(req.cookie_value(self.config.checksum_cookie_name()));

        let (current, reissued) = match (token_cookie, checksum_cookie) {
            (Some(token), Some(_)) => (CsrfToken::new(token), false),
            _ => (self.issue(cookies), true),
        };

        let method = match req.request_method() {
            Some(method) if !self.config.is_ignored(method) => method,
            _ => return Verdict::Allow(current),
        };

        if reissued && self.config.policy() == ReissuePolicy::RejectImmediately {
            return self.reject(method, RejectReason::CookiesReissued);
        }

        let candidate = TOKEN_HEADERS
            .iter()
            .find_map(|name| non_empty(req.header_value(name)))
            .unwrap_or("");

        if self
            .crypto
            .verify_checksum(candidate, checksum_cookie.unwrap_or(""), self.config.secret())
        {
            tracing::debug!(method, "CSRF token verified");
            if reissued || token_cookie == Some(candidate) {
                return Verdict::Allow(current);
            }
            // The checksum vouches for the header token, not the stale token cookie.
            return Verdict::Allow(self.issue(cookies));
        }

        self.issue(cookies);
        self.reject(method, RejectReason::InvalidToken)
    }

    fn reject(&self, method: &str, reason: RejectReason) -> Verdict {
        tracing::warn!(method, %reason, "CSRF validation failed");
        Verdict::Reject(Rejection::new(self.config.message(), reason))
    }
}

impl fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
