//! Credential validation at the HTTP boundary.
//!
//! For each request the middleware:
//! 1. Skips requests matched by the skipper (CORS preflight by default)
//! 2. Extracts the bearer credential from `Authorization`
//! 3. Decodes it and asks the runtime to validate it
//! 4. Inserts the resulting [`RequestContext`] into the request extensions
//!
//! Failures short-circuit with a problem response, see [`IamError`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use iam_runtime::{Capability, Error, ErrorKind, RequestContext, RuntimeHandle, Token, bearer_token};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};

use crate::error::IamError;

/// Predicate selecting requests that bypass authentication.
pub type Skipper = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Shared state for the IAM middleware.
#[derive(Clone)]
pub struct IamState {
    runtime: RuntimeHandle,
    cancellation: CancellationToken,
    skipper: Skipper,
}

impl fmt::Debug for IamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamState")
            .field("runtime", &self.runtime)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}

impl IamState {
    /// # Errors
    ///
    /// [`ErrorKind::RuntimeNotFound`] when `runtime` cannot validate
    /// credentials.
    pub fn new(runtime: RuntimeHandle) -> Result<Self, Error> {
        if !runtime.supports(Capability::Authentication) {
            return Err(Error::new(ErrorKind::RuntimeNotFound).with_context("authentication"));
        }
        Ok(Self {
            runtime,
            cancellation: CancellationToken::new(),
            skipper: Arc::new(|req: &Request| is_preflight_request(req.method(), req.headers())),
        })
    }

    /// Replace the default preflight skip. Matching requests reach the
    /// handler without a [`RequestContext`].
    ///
    /// ```ignore
    /// let state = IamState::new(runtime)?
    ///     .with_skipper(|req: &Request| req.uri().path() == "/healthz");
    /// ```
    #[must_use]
    pub fn with_skipper<F>(mut self, skipper: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skipper = Arc::new(skipper);
        self
    }

    fn skips(&self, req: &Request) -> bool {
        (self.skipper)(req)
    }

    /// Abort in-flight runtime calls when `cancellation` fires, e.g. on
    /// shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    #[must_use]
    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<RequestContext, Error> {
        let credential = bearer_token(headers)?;
        let token = Token::decode_unverified(credential)
            .map_err(|e| Error::wrap(ErrorKind::MalformedCredential, e))?;
        let subject = token.subject().to_owned();

        let ctx = RequestContext::new()
            .with_runtime(self.runtime.clone())
            .with_cancellation(self.cancellation.clone())
            .with_token(token)
            .with_subject(subject);

        ctx.validate_credential(credential).await?;
        Ok(ctx)
    }
}

/// Middleware for `axum::middleware::from_fn_with_state`.
///
/// ```ignore
/// let app = Router::new()
///     .route("/lb/{id}", put(update))
///     .layer(from_fn_with_state(IamState::new(runtime)?, iam_middleware));
/// ```
pub async fn iam_middleware(
    State(state): State<IamState>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.skips(&req) {
        return next.run(req).await;
    }

    match state.authenticate(req.headers()).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => IamError::from(err).into_response(),
    }
}

/// Tower layer form of [`iam_middleware`].
///
/// ```ignore
/// router = router.layer(IamLayer::new(IamState::new(runtime)?));
/// ```
#[derive(Debug, Clone)]
pub struct IamLayer {
    state: IamState,
}

impl IamLayer {
    #[must_use]
    pub fn new(state: IamState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for IamLayer {
    type Service = IamService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IamService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IamService<S> {
    inner: S,
    state: IamState,
}

impl<S> Service<Request<Body>> for IamService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            if state.skips(&request) {
                return ready_inner.call(request).await;
            }

            match state.authenticate(request.headers()).await {
                Ok(ctx) => {
                    request.extensions_mut().insert(ctx);
                    ready_inner.call(request).await
                }
                Err(err) => Ok(IamError::from(err).into_response()),
            }
        })
    }
}

/// Preflight requests are OPTIONS requests carrying both `Origin` and
/// `Access-Control-Request-Method`.
fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(header::ORIGIN)
        && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}
