use crate::error::{CsrfError, Result};
use crate::token::Secret;
use cookie::{Cookie, SameSite};
use http::HeaderValue;
use serde::Deserialize;
use std::time::Duration;

/// Methods exempt from validation unless configured otherwise.
pub const DEFAULT_IGNORE_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

/// Default name of the token cookie.
pub const DEFAULT_TOKEN_KEY: &str = "csrfToken";

/// Default name of the checksum cookie.
pub const DEFAULT_CHECKSUM_KEY: &str = "csrfChecksum";

/// Default message of a rejected request.
pub const DEFAULT_ERROR_MESSAGE: &str = "Invalid CSRF token provided.";

/// What the guard does with a state-changing request that arrived without a
/// complete cookie pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReissuePolicy {
    /// Reject at once. The client cannot have read a token that was issued
    /// by this very response.
    #[default]
    RejectImmediately,
    /// Verify the header token against whatever checksum cookie arrived, so a
    /// request carrying only a checksum cookie and the matching token passes.
    VerifyAnyway,
}

/// The `SameSite` attribute of the issued cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// Serialization options shared by the token and checksum cookies.
///
/// `None` leaves the attribute off the cookie. The checksum cookie is always
/// written `HttpOnly`, whatever `http_only` says.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CookieOptions {
    /// Default: `/`
    pub path: Option<String>,
    /// Default: none
    pub domain: Option<String>,
    /// Default: none
    pub secure: Option<bool>,
    /// Applies to the token cookie only. Default: none
    pub http_only: Option<bool>,
    /// Default: `Strict`
    pub same_site: Option<SameSitePolicy>,
    /// Lifetime in seconds. Default: session cookie
    pub max_age: Option<i64>,
    /// Default: none
    pub partitioned: Option<bool>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            secure: None,
            http_only: None,
            same_site: Some(SameSitePolicy::Strict),
            max_age: None,
            partitioned: None,
        }
    }
}

impl CookieOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the cookie domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the secure flag.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Set the `HttpOnly` flag of the token cookie.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }

    /// Set the SameSite attribute, or drop it with `None`.
    pub fn same_site(mut self, same_site: Option<SameSitePolicy>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set the cookie lifetime.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
        self
    }

    /// Set the partitioned flag.
    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = Some(partitioned);
        self
    }

    fn validate(&self) -> Result<()> {
        for (option, value) in [("path", &self.path), ("domain", &self.domain)] {
            let Some(value) = value else { continue };
            if value.is_empty() || value.chars().any(|c| c == ';' || c.is_ascii_control()) {
                return Err(CsrfError::InvalidCookieOption {
                    option,
                    reason: format!("{value:?} must be non-empty and free of `;` and control characters"),
                });
            }
        }

        if let Some(max_age) = self.max_age.filter(|secs| *secs < 0) {
            return Err(CsrfError::InvalidCookieOption {
                option: "max_age",
                reason: format!("{max_age} is negative"),
            });
        }

        Ok(())
    }

    pub(crate) fn to_cookie(&self, name: &str, value: &str, force_http_only: bool) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()));

        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(secure) = self.secure {
            builder = builder.secure(secure);
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site.into());
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(cookie::time::Duration::seconds(max_age));
        }
        if let Some(partitioned) = self.partitioned {
            builder = builder.partitioned(partitioned);
        }

        // Applied last so nothing above can switch it off.
        if force_http_only {
            builder = builder.http_only(true);
        } else if let Some(http_only) = self.http_only {
            builder = builder.http_only(http_only);
        }

        builder.build()
    }
}

/// Configuration for CSRF protection.
///
/// Only `secret` is required. Everything else falls back to the defaults
/// documented on each setter.
///
/// # Example
///
/// ```rust
/// use rustapi_csrf::{CookieOptions, CsrfConfig};
///
/// let config = CsrfConfig::new("a long random secret")
///     .ignore_methods(["GET", "HEAD", "OPTIONS", "TRACE"])
///     .cookie(CookieOptions::new().secure(true));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrfConfig {
    secret: Secret,
    #[serde(default = "default_ignore_methods")]
    ignore_methods: Vec<String>,
    #[serde(default = "default_token_key")]
    token_key: String,
    #[serde(default = "default_checksum_key")]
    checksum_key: String,
    #[serde(default = "default_error_message")]
    error_message: String,
    #[serde(default)]
    cookie: CookieOptions,
    #[serde(default = "default_validate_on_request")]
    validate_on_request: bool,
    #[serde(default)]
    reissue_policy: ReissuePolicy,
}

fn default_ignore_methods() -> Vec<String> {
    DEFAULT_IGNORE_METHODS.iter().map(|m| m.to_string()).collect()
}

fn default_token_key() -> String {
    DEFAULT_TOKEN_KEY.to_string()
}

fn default_checksum_key() -> String {
    DEFAULT_CHECKSUM_KEY.to_string()
}

fn default_error_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}

fn default_validate_on_request() -> bool {
    true
}

impl CsrfConfig {
    /// Create a default configuration around a shared secret.
    pub fn new(secret: impl Into<Secret>) -> Self {
        Self {
            secret: secret.into(),
            ignore_methods: default_ignore_methods(),
            token_key: default_token_key(),
            checksum_key: default_checksum_key(),
            error_message: default_error_message(),
            cookie: CookieOptions::default(),
            validate_on_request: default_validate_on_request(),
            reissue_policy: ReissuePolicy::default(),
        }
    }

    /// Load `.env` if present, then read `CSRF_*` environment variables.
    ///
    /// Recognized variables: `CSRF_SECRET` (required), `CSRF_IGNORE_METHODS`
    /// (comma separated), `CSRF_TOKEN_KEY`, `CSRF_CHECKSUM_KEY`,
    /// `CSRF_ERROR_MESSAGE`, `CSRF_VALIDATE_ON_REQUEST`, `CSRF_REISSUE_POLICY`,
    /// and `CSRF_COOKIE_PATH`, `CSRF_COOKIE_DOMAIN`, `CSRF_COOKIE_SECURE`,
    /// `CSRF_COOKIE_HTTP_ONLY`, `CSRF_COOKIE_SAME_SITE`, `CSRF_COOKIE_MAX_AGE`,
    /// `CSRF_COOKIE_PARTITIONED`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env_prefixed("CSRF_")
    }

    /// Read the configuration from environment variables with a custom prefix.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self> {
        let env: EnvConfig = envy::prefixed(prefix).from_env()?;
        Ok(env.into())
    }

    /// Set the methods that are never validated.
    /// Default: `GET`, `HEAD`, `OPTIONS`
    pub fn ignore_methods<I, M>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        self.ignore_methods = methods
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect();
        self
    }

    /// Set the name of the token cookie.
    /// Default: `csrfToken`
    pub fn token_key(mut self, name: impl Into<String>) -> Self {
        self.token_key = name.into();
        self
    }

    /// Set the name of the checksum cookie.
    /// Default: `csrfChecksum`
    pub fn checksum_key(mut self, name: impl Into<String>) -> Self {
        self.checksum_key = name.into();
        self
    }

    /// Set the message sent with rejected requests.
    /// Default: `Invalid CSRF token provided.`
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Set the serialization options of both cookies.
    pub fn cookie(mut self, options: CookieOptions) -> Self {
        self.cookie = options;
        self
    }

    /// Validate every request automatically (`true`), or only expose a
    /// [`CsrfValidator`](crate::CsrfValidator) for handlers to call (`false`).
    /// Default: `true`
    pub fn validate_on_request(mut self, enabled: bool) -> Self {
        self.validate_on_request = enabled;
        self
    }

    /// Set what happens to state-changing requests without a cookie pair.
    /// Default: [`ReissuePolicy::RejectImmediately`]
    pub fn reissue_policy(mut self, policy: ReissuePolicy) -> Self {
        self.reissue_policy = policy;
        self
    }

    /// The shared secret.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Name of the token cookie.
    pub fn token_cookie_name(&self) -> &str {
        &self.token_key
    }

    /// Name of the checksum cookie.
    pub fn checksum_cookie_name(&self) -> &str {
        &self.checksum_key
    }

    /// Message sent with rejected requests.
    pub fn message(&self) -> &str {
        &self.error_message
    }

    /// Cookie serialization options.
    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie
    }

    /// Whether requests are validated automatically.
    pub fn validates_on_request(&self) -> bool {
        self.validate_on_request
    }

    /// Policy for requests without a cookie pair.
    pub fn policy(&self) -> ReissuePolicy {
        self.reissue_policy
    }

    /// Methods that are never validated, uppercase once the guard is built.
    pub fn ignored_methods(&self) -> &[String] {
        &self.ignore_methods
    }

    /// Whether `method` is exempt from validation. Case-insensitive.
    pub fn is_ignored(&self, method: &str) -> bool {
        self.ignore_methods
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(method))
    }

    /// Check the configuration and normalize the ignored methods to uppercase.
    pub(crate) fn validate(mut self) -> Result<Self> {
        if self.secret.is_empty() {
            return Err(CsrfError::MissingSecret);
        }

        for (option, name) in [
            ("token_key", &self.token_key),
            ("checksum_key", &self.checksum_key),
        ] {
            if !is_cookie_name(name) {
                return Err(CsrfError::InvalidCookieName {
                    option,
                    name: name.clone(),
                });
            }
        }

        if self.token_key == self.checksum_key {
            return Err(CsrfError::SharedCookieName(self.token_key));
        }

        let mut methods: Vec<String> = Vec::with_capacity(self.ignore_methods.len());
        for method in &self.ignore_methods {
            if method.is_empty() || http::Method::from_bytes(method.as_bytes()).is_err() {
                return Err(CsrfError::InvalidMethod(method.clone()));
            }
            let method = method.to_ascii_uppercase();
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        self.ignore_methods = methods;

        self.cookie.validate()?;
        for (name, force_http_only) in [(&self.token_key, false), (&self.checksum_key, true)] {
            let cookie = self.cookie.to_cookie(name, "x", force_http_only);
            if HeaderValue::from_str(&cookie.to_string()).is_err() {
                return Err(CsrfError::InvalidCookieOption {
                    option: "cookie",
                    reason: format!("`{cookie}` is not a valid Set-Cookie header value"),
                });
            }
        }

        Ok(self)
    }
}

/// RFC 6265 `cookie-name`: a non-empty token of visible ASCII without separators.
fn is_cookie_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !SEPARATORS.contains(&b))
}

/// Flat shape of the configuration as read from the environment.
#[derive(Debug, Deserialize)]
struct EnvConfig {
    secret: Secret,
    ignore_methods: Option<Vec<String>>,
    token_key: Option<String>,
    checksum_key: Option<String>,
    error_message: Option<String>,
    validate_on_request: Option<bool>,
    reissue_policy: Option<ReissuePolicy>,
    cookie_path: Option<String>,
    cookie_domain: Option<String>,
    cookie_secure: Option<bool>,
    cookie_http_only: Option<bool>,
    cookie_same_site: Option<SameSitePolicy>,
    cookie_max_age: Option<i64>,
    cookie_partitioned: Option<bool>,
}

impl From<EnvConfig> for CsrfConfig {
    fn from(env: EnvConfig) -> Self {
        let defaults = CookieOptions::default();
        let cookie = CookieOptions {
            path: env.cookie_path.or(defaults.path),
            domain: env.cookie_domain,
            secure: env.cookie_secure,
            http_only: env.cookie_http_only,
            same_site: env.cookie_same_site.or(defaults.same_site),
            max_age: env.cookie_max_age,
            partitioned: env.cookie_partitioned,
        };

        let mut config = CsrfConfig::new(env.secret).cookie(cookie);
        if let Some(methods) = env.ignore_methods {
            config = config.ignore_methods(methods);
        }
        if let Some(name) = env.token_key {
            config = config.token_key(name);
        }
        if let Some(name) = env.checksum_key {
            config = config.checksum_key(name);
        }
        if let Some(message) = env.error_message {
            config = config.error_message(message);
        }
        if let Some(enabled) = env.validate_on_request {
            config = config.validate_on_request(enabled);
        }
        if let Some(policy) = env.reissue_policy {
            config = config.reissue_policy(policy);
        }
        config
    }
}
