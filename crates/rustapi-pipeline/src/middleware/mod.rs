//! Middleware infrastructure for the pipeline
//!
//! Middleware is added with [`Pipeline::layer`](crate::Pipeline::layer) or by a
//! plugin through [`Registrar::layer`](crate::Registrar::layer).
//!
//! # Example
//!
//! ```rust,ignore
//! use rustapi_pipeline::{Pipeline, middleware::MiddlewareLayer};
//!
//! Pipeline::new()
//!     .layer(MyLayer::new())
//!     .handler(handler);
//! ```

mod layer;

pub use layer::{BoxedNext, LayerStack, MiddlewareLayer};
