//! Pipeline integration: the automatic layer and the manual validator.

use crate::guard::{CsrfGuard, Verdict};
use rustapi_pipeline::{ApiError, BoxedNext, IntoResponse, MiddlewareLayer, Request, Response, SetCookies};
use std::future::Future;
use std::pin::Pin;

/// Middleware that runs the guard before every handler.
///
/// Allowed requests continue with their [`CsrfToken`](crate::CsrfToken) in the
/// request extensions. Rejected requests get a `400` JSON error. Cookies the
/// guard issued are written onto the response either way.
#[derive(Clone, Debug)]
pub struct CsrfLayer {
    guard: CsrfGuard,
}

impl CsrfLayer {
    /// Wrap a guard.
    pub fn new(guard: CsrfGuard) -> Self {
        Self { guard }
    }
}

impl MiddlewareLayer for CsrfLayer {
    fn call(
        &self,
        mut req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        let mut cookies = SetCookies::new();

        match self.guard.evaluate(&req, &mut cookies) {
            Verdict::Allow(token) => {
                req.extensions_mut().insert(token);
                Box::pin(async move {
                    let mut response = next(req).await;
                    cookies.apply(&mut response);
                    response
                })
            }
            Verdict::Reject(rejection) => {
                let mut response = ApiError::from(rejection).into_response();
                cookies.apply(&mut response);
                Box::pin(async move { response })
            }
        }
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

/// Validation that handlers invoke themselves.
///
/// Published as a pipeline decoration when the plugin is registered with
/// `validate_on_request(false)`.
///
/// ```rust,ignore
/// async fn update(req: Request) -> Response {
///     let Some(validator) = req.state().get::<CsrfValidator>() else {
///         return ApiError::internal("CSRF plugin missing").into_response();
///     };
///     let cookies = match validator.validate(&req).into_result() {
///         Ok(cookies) => cookies,
///         Err(rejected) => return rejected,
///     };
///
///     let mut response = "updated".into_response();
///     cookies.apply(&mut response);
///     response
/// }
/// ```
#[derive(Clone, Debug)]
pub struct CsrfValidator {
    guard: CsrfGuard,
}

impl CsrfValidator {
    /// Wrap a guard.
    pub fn new(guard: CsrfGuard) -> Self {
        Self { guard }
    }

    /// The guard this validator runs.
    pub fn guard(&self) -> &CsrfGuard {
        &self.guard
    }

    /// Evaluate a request.
    pub fn validate(&self, req: &Request) -> CsrfCheck {
        let mut cookies = SetCookies::new();
        let verdict = self.guard.evaluate(req, &mut cookies);
        CsrfCheck { verdict, cookies }
    }

    /// A layer running this validator automatically.
    pub fn layer(&self) -> CsrfLayer {
        CsrfLayer::new(self.guard.clone())
    }
}

/// Result of [`CsrfValidator::validate`].
#[derive(Debug)]
pub struct CsrfCheck {
    verdict: Verdict,
    cookies: SetCookies,
}

impl CsrfCheck {
    /// The verdict
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Cookies the response must carry
    pub fn cookies(&self) -> &SetCookies {
        &self.cookies
    }

    /// Split into the verdict and the cookies to send.
    pub fn into_parts(self) -> (Verdict, SetCookies) {
        (self.verdict, self.cookies)
    }

    /// `Ok` with the cookies to put on the handler's response, or `Err` with
    /// the finished rejection response.
    pub fn into_result(self) -> Result<SetCookies, Response> {
        match self.verdict {
            Verdict::Allow(_) => Ok(self.cookies),
            Verdict::Reject(rejection) => {
                let mut response = ApiError::from(rejection).into_response();
                self.cookies.apply(&mut response);
                Err(response)
            }
        }
    }
}
