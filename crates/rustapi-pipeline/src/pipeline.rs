//! Pipeline builder and dispatcher

use crate::error::{ApiError, PipelineError};
use crate::middleware::{BoxedNext, LayerStack, MiddlewareLayer};
use crate::plugin::{Plugin, Registrar};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use bytes::Bytes;
use http::Extensions;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A request pipeline: middleware layers, installed plugins and a final handler.
///
/// The set of installed plugin names is owned by the pipeline instance, so two
/// pipelines in the same process can each install the same plugin once.
///
/// # Example
///
/// ```rust,ignore
/// use rustapi_pipeline::{CookieParser, Pipeline};
///
/// let pipeline = Pipeline::new()
///     .register(CookieParser)?
///     .handler(|_req| async { "ok" });
///
/// let response = pipeline.dispatch(http::Request::new(Bytes::new())).await;
/// ```
pub struct Pipeline {
    layers: LayerStack,
    state: Arc<Extensions>,
    installed: BTreeSet<&'static str>,
    handler: BoxedNext,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        // Initialize tracing if not already done
        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,rustapi=debug")),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();

        let handler: BoxedNext = Arc::new(|req: Request| {
            let message = format!("No handler installed for {} {}", req.method(), req.path());
            Box::pin(async move { ApiError::not_found(message).into_response() })
                as Pin<Box<dyn Future<Output = Response> + Send + 'static>>
        });

        Self {
            layers: LayerStack::new(),
            state: Arc::new(Extensions::new()),
            installed: BTreeSet::new(),
            handler,
        }
    }

    /// Install a plugin.
    ///
    /// Fails if a plugin with the same name is already installed on this
    /// pipeline, if one of its dependencies is not installed yet, or if the
    /// plugin itself reports an error.
    pub fn register<P: Plugin>(mut self, plugin: P) -> Result<Self, PipelineError> {
        let name = plugin.name();
        if self.installed.contains(name) {
            return Err(PipelineError::AlreadyRegistered { plugin: name });
        }

        if let Some(dependency) = plugin
            .dependencies()
            .iter()
            .copied()
            .find(|dependency| !self.installed.contains(dependency))
        {
            return Err(PipelineError::MissingDependency {
                plugin: name,
                dependency,
            });
        }

        let mut registrar =
            Registrar::new(name, &mut self.layers, Arc::make_mut(&mut self.state));
        plugin.register(&mut registrar)?;

        self.installed.insert(name);
        tracing::debug!(plugin = name, layers = self.layers.len(), "plugin registered");
        Ok(self)
    }

    /// Add a middleware layer after everything registered so far
    pub fn layer<L: MiddlewareLayer>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Set the handler requests reach once every layer let them through
    pub fn handler<H, Fut, R>(mut self, handler: H) -> Self
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.handler = Arc::new(move |req: Request| {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() })
                as Pin<Box<dyn Future<Output = Response> + Send + 'static>>
        });
        self
    }

    /// Whether a plugin with this name is installed
    pub fn has_plugin(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Names of installed plugins, sorted
    pub fn plugins(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.installed.iter().copied()
    }

    /// Get a value a plugin published with [`Registrar::decorate`]
    pub fn decoration<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.state.get::<T>()
    }

    /// Run a request through the layers and the handler.
    pub fn dispatch(
        &self,
        req: http::Request<Bytes>,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let (parts, _) = req.into_parts();
        let request = Request::new(parts, self.state.clone());
        self.layers.execute(request, self.handler.clone())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("layers", &self.layers)
            .field("plugins", &self.installed)
            .finish()
    }
}
