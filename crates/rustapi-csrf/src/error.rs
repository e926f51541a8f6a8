use thiserror::Error;

/// Errors raised while building a CSRF guard.
///
/// These are configuration errors: they surface when the plugin is registered
/// and never while requests are being served.
#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("option `secret` must be a non-empty string")]
    MissingSecret,

    #[error("option `{option}` is not a valid cookie name: {name:?}")]
    InvalidCookieName { option: &'static str, name: String },

    #[error("options `token_key` and `checksum_key` must differ (both are {0:?})")]
    SharedCookieName(String),

    #[error("cookie option `{option}` is invalid: {reason}")]
    InvalidCookieOption { option: &'static str, reason: String },

    #[error("option `ignore_methods` contains an invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("failed to read CSRF configuration from the environment: {0}")]
    Env(#[from] envy::Error),
}

pub type Result<T, E = CsrfError> = std::result::Result<T, E>;
