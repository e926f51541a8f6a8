//! Plugin registration
//!
//! A plugin is a named unit of functionality installed into a
//! [`Pipeline`](crate::Pipeline). During registration it receives a
//! [`Registrar`] through which it adds middleware or publishes values
//! (decorations) into the pipeline's shared state.

use crate::error::PipelineError;
use crate::middleware::{LayerStack, MiddlewareLayer};
use http::Extensions;

/// A named, installable piece of pipeline functionality.
///
/// # Example
///
/// ```rust,ignore
/// use rustapi_pipeline::{Plugin, PipelineError, Registrar};
///
/// struct Greeting;
///
/// impl Plugin for Greeting {
///     fn name(&self) -> &'static str {
///         "greeting"
///     }
///
///     fn register(self, registrar: &mut Registrar<'_>) -> Result<(), PipelineError> {
///         registrar.decorate(String::from("hello"));
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin {
    /// Unique name of the plugin. A pipeline installs each name at most once.
    fn name(&self) -> &'static str;

    /// Names of plugins that must already be installed.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    /// Install the plugin.
    ///
    /// An error aborts registration and leaves the plugin uninstalled.
    fn register(self, registrar: &mut Registrar<'_>) -> Result<(), PipelineError>;
}

/// Registration context handed to [`Plugin::register`].
pub struct Registrar<'a> {
    plugin: &'static str,
    layers: &'a mut LayerStack,
    state: &'a mut Extensions,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(
        plugin: &'static str,
        layers: &'a mut LayerStack,
        state: &'a mut Extensions,
    ) -> Self {
        Self {
            plugin,
            layers,
            state,
        }
    }

    /// Name of the plugin being registered
    pub fn plugin(&self) -> &'static str {
        self.plugin
    }

    /// Install a request interceptor after every layer registered so far.
    pub fn layer<L: MiddlewareLayer>(&mut self, layer: L) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Publish a value into the pipeline's shared state.
    ///
    /// Handlers read it back through [`Request::state`](crate::Request::state),
    /// and application code through [`Pipeline::decoration`](crate::Pipeline::decoration).
    pub fn decorate<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.state.insert(value);
        self
    }
}
