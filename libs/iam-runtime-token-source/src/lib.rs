#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Access tokens for outbound calls, issued by the IAM runtime identity
//! service and cached until they expire.
//!
//! ```ignore
//! let source = TokenSource::from_runtime(&runtime)?
//!     .with_expiry_skew(Duration::from_secs(30))
//!     .with_cancellation(shutdown.child_token());
//!
//! let token = source.token().await?;
//! request.headers_mut().insert(AUTHORIZATION, token.authorization_header()?);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use http::HeaderValue;
use iam_runtime::proto::identity::GetAccessTokenRequest;
use iam_runtime::{Error, ErrorKind, IdentityClient, RuntimeHandle, Token};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Token type of every token issued by the runtime.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Access token issued by the runtime.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    token_type: &'static str,
    expiry: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn from_token(token: &Token) -> Self {
        Self {
            secret: SecretString::from(token.raw()),
            token_type: TOKEN_TYPE_BEARER,
            expiry: token.expiry(),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn token_type(&self) -> &'static str {
        self.token_type
    }

    /// The token's `exp` claim. Tokens without one are never reused.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Whether the token is still usable at `now` with `skew` subtracted
    /// from its lifetime.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let Some(expiry) = self.expiry else {
            return false;
        };
        let skew = TimeDelta::from_std(skew).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(skew)
            .is_some_and(|deadline| deadline < expiry)
    }

    /// `Authorization` header value for this token, marked sensitive.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::AccessTokenInvalid`] if the token contains bytes that are
    /// not allowed in a header value.
    pub fn authorization_header(&self) -> Result<HeaderValue, Error> {
        let mut value = HeaderValue::try_from(format!(
            "{} {}",
            self.token_type,
            self.secret.expose_secret()
        ))
        .map_err(|e| Error::wrap(ErrorKind::AccessTokenInvalid, e))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Fetches access tokens from the identity service and reuses them until
/// they expire.
///
/// Clones share the cache. Concurrent callers are serialized, so at most one
/// request to the identity service is in flight per source.
#[derive(Clone)]
pub struct TokenSource {
    identity: Arc<dyn IdentityClient>,
    expiry_skew: Duration,
    cancellation: CancellationToken,
    cache: Arc<Mutex<Option<AccessToken>>>,
}

impl TokenSource {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
        Self {
            identity,
            expiry_skew: Duration::ZERO,
            cancellation: CancellationToken::new(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Source backed by the identity capability of `runtime`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::RuntimeNotFound`] when the runtime has no identity
    /// capability.
    pub fn from_runtime(runtime: &RuntimeHandle) -> Result<Self, Error> {
        runtime
            .identity()
            .map(|identity| Self::new(Arc::clone(identity)))
            .ok_or_else(|| Error::new(ErrorKind::RuntimeNotFound).with_context("identity"))
    }

    /// Treat tokens as expired `skew` before their `exp` claim.
    #[must_use]
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Abort identity service requests once `cancellation` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    #[must_use]
    pub fn expiry_skew(&self) -> Duration {
        self.expiry_skew
    }

    /// Return the cached token while it is valid, otherwise fetch a new one.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::IdentityTokenRequestFailed`] when the identity service
    /// call fails or the source is cancelled; the previous cache entry is
    /// kept.
    /// [`ErrorKind::AccessTokenInvalid`] when the issued token is not a JWT
    /// or has an unusable `exp` claim.
    pub async fn token(&self) -> Result<AccessToken, Error> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref()
            && cached.is_valid_at(Utc::now(), self.expiry_skew)
        {
            return Ok(cached.clone());
        }

        let result = tokio::select! {
            biased;
            () = self.cancellation.cancelled() => {
                tracing::debug!("access token request cancelled");
                return Err(Error::wrap(
                    ErrorKind::IdentityTokenRequestFailed,
                    Error::new(ErrorKind::Cancelled),
                ));
            }
            res = self.identity.get_access_token(GetAccessTokenRequest {}) => res,
        };
        let response = result.map_err(|status| {
            tracing::debug!(code = ?status.code(), "access token request failed");
            Error::wrap(ErrorKind::IdentityTokenRequestFailed, status)
        })?;

        let decoded = Token::decode_unverified(&response.token)
            .map_err(|e| Error::wrap(ErrorKind::AccessTokenInvalid, e))?;
        let token = AccessToken::from_token(&decoded);

        tracing::debug!(expiry = ?token.expiry(), "fetched access token");
        *cache = Some(token.clone());
        Ok(token)
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSource")
            .field("expiry_skew", &self.expiry_skew)
            .finish_non_exhaustive()
    }
}
