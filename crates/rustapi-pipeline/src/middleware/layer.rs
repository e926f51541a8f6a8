//! Middleware layers and the stack that chains them around the handler.

use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by middleware and the final handler
type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync>;

/// Trait for middleware installed into a [`Pipeline`](crate::Pipeline)
///
/// A layer either calls `next` to continue the chain, or returns a response of
/// its own without calling it, which stops the request before the handler.
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// An ordered stack of middleware layers
///
/// Layers run in the order they were pushed on the way in, and in reverse
/// order on the way out.
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Arc<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the inside of the stack
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(Arc::from(layer));
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture {
        let chain = self.layers.iter().rev().fold(handler, |next, layer| {
            let layer = Arc::clone(layer);
            Arc::new(move |req: Request| layer.call(req, next.clone())) as BoxedNext
        });

        chain(req)
    }
}

impl std::fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::IntoResponse;
    use http::{Extensions, Method, StatusCode};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn request(method: Method) -> Request {
        let (parts, _) = http::Request::builder()
            .method(method)
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        Request::new(parts, Arc::new(Extensions::new()))
    }

    fn handler(called: Arc<AtomicBool>) -> BoxedNext {
        Arc::new(move |_req: Request| {
            let called = called.clone();
            Box::pin(async move {
                called.store(true, Ordering::SeqCst);
                "handled".into_response()
            }) as BoxFuture
        })
    }

    #[derive(Clone)]
    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<(usize, &'static str)>>>,
    }

    impl MiddlewareLayer for Recorder {
        fn call(&self, req: Request, next: BoxedNext) -> BoxFuture {
            let id = self.id;
            let log = self.log.clone();
            Box::pin(async move {
                log.lock().unwrap().push((id, "in"));
                let response = next(req).await;
                log.lock().unwrap().push((id, "out"));
                response
            })
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    /// Rejects everything but GET without reaching the handler.
    #[derive(Clone)]
    struct GetOnly;

    impl MiddlewareLayer for GetOnly {
        fn call(&self, req: Request, next: BoxedNext) -> BoxFuture {
            if *req.method() == Method::GET {
                next(req)
            } else {
                Box::pin(async { StatusCode::BAD_REQUEST.into_response() })
            }
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn empty_stack_calls_handler_directly() {
        let called = Arc::new(AtomicBool::new(false));
        let stack = LayerStack::new();

        let response = stack.execute(request(Method::GET), handler(called.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn short_circuit_skips_handler_and_inner_layers() {
        let called = Arc::new(AtomicBool::new(false));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut stack = LayerStack::new();
        stack.push(Box::new(Recorder { id: 0, log: log.clone() }));
        stack.push(Box::new(GetOnly));
        stack.push(Box::new(Recorder { id: 1, log: log.clone() }));

        let response = stack.execute(request(Method::POST), handler(called.clone())).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(*log.lock().unwrap(), vec![(0, "in"), (0, "out")]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn layers_wrap_the_handler_in_push_order(count in 1usize..8) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let log = Arc::new(Mutex::new(Vec::new()));

            let mut stack = LayerStack::new();
            for id in 0..count {
                stack.push(Box::new(Recorder { id, log: log.clone() }));
            }

            let called = Arc::new(AtomicBool::new(false));
            rt.block_on(stack.execute(request(Method::GET), handler(called.clone())));
            prop_assert!(called.load(Ordering::SeqCst));

            let expected: Vec<_> = (0..count)
                .map(|id| (id, "in"))
                .chain((0..count).rev().map(|id| (id, "out")))
                .collect();
            prop_assert_eq!(log.lock().unwrap().clone(), expected);
        }
    }
}
