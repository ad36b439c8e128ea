use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, Error, ErrorKind};
use crate::runtime::RuntimeHandle;
use crate::token::Token;

/// Request-scoped state threaded through the access-control pipeline.
///
/// Holds the runtime handle, the decoded credential and the subject derived
/// from it, plus the cancellation signal every remote call issued through
/// this carrier races against.
///
/// Setters return a new carrier and leave `self` untouched, so a carrier
/// handed to one stage can never be changed by a later one. Getters return
/// `None` when nothing was set; an empty subject is a value, not absence.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    runtime: Option<RuntimeHandle>,
    token: Option<Arc<Token>>,
    subject: Option<Arc<str>>,
    cancellation: CancellationToken,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_runtime(&self, runtime: RuntimeHandle) -> Self {
        Self {
            runtime: Some(runtime),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_token(&self, token: Token) -> Self {
        Self {
            token: Some(Arc::new(token)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_subject(&self, subject: impl Into<Arc<str>>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..self.clone()
        }
    }

    /// Replace the cancellation signal. Defaults to one that never fires.
    #[must_use]
    pub fn with_cancellation(&self, cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn runtime(&self) -> Option<&RuntimeHandle> {
        self.runtime.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Await `call` unless the carrier is cancelled first.
    pub(crate) async fn call<T, E, F>(&self, call: F) -> Result<T, BoxError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Error::new(ErrorKind::Cancelled).into()),
            res = call => res.map_err(Into::into),
        }
    }
}
