use crate::config::CsrfConfig;
use crate::guard::CsrfGuard;
use crate::layer::{CsrfLayer, CsrfValidator};
use crate::token::TokenCrypto;
use rustapi_pipeline::{CookieParser, Plugin, PipelineError, Registrar};
use std::sync::Arc;

/// Installs CSRF protection into a [`Pipeline`](rustapi_pipeline::Pipeline).
///
/// Requires [`CookieParser`] to be registered first. Registering it twice on
/// one pipeline fails, as does an invalid configuration.
///
/// ```rust,ignore
/// let pipeline = Pipeline::new()
///     .register(CookieParser)?
///     .register(CsrfPlugin::new(CsrfConfig::new("secret")))?
///     .handler(handler);
/// ```
pub struct CsrfPlugin {
    config: CsrfConfig,
    crypto: Option<Arc<dyn TokenCrypto>>,
}

impl CsrfPlugin {
    /// Registration name of the plugin
    pub const NAME: &'static str = "rustapi-csrf";

    /// Create the plugin.
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config,
            crypto: None,
        }
    }

    /// Use custom token primitives instead of HMAC-SHA256.
    pub fn with_crypto(mut self, crypto: Arc<dyn TokenCrypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }
}

impl Plugin for CsrfPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &[CookieParser::NAME]
    }

    fn register(self, registrar: &mut Registrar<'_>) -> Result<(), PipelineError> {
        let validate_on_request = self.config.validates_on_request();
        let guard = match self.crypto {
            Some(crypto) => CsrfGuard::with_crypto(self.config, crypto),
            None => CsrfGuard::new(self.config),
        }
        .map_err(|e| PipelineError::plugin(Self::NAME, e))?;

        if validate_on_request {
            registrar.layer(CsrfLayer::new(guard));
        } else {
            registrar.decorate(CsrfValidator::new(guard));
        }

        tracing::debug!(validate_on_request, "CSRF protection installed");
        Ok(())
    }
}

impl std::fmt::Debug for CsrfPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfPlugin")
            .field("config", &self.config)
            .field("custom_crypto", &self.crypto.is_some())
            .finish()
    }
}
