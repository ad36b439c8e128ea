//! Signature-unverified JWT decoding.
//!
//! A [`Token`] only proves that a credential is syntactically a JWT. Whether
//! the credential is valid is decided by the runtime, see
//! [`RequestContext::validate_credential`](crate::RequestContext::validate_credential).

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::Header;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Claims the pipeline reads. Everything else is kept in [`Claims::extra`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("malformed token: {0}")]
    Malformed(#[from] jsonwebtoken::errors::Error),

    #[error("invalid exp claim: {0}")]
    InvalidExpiry(f64),
}

/// Decoded credential.
#[derive(Clone)]
pub struct Token {
    raw: SecretString,
    header: Header,
    claims: Claims,
    expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Decode `raw` without checking its signature or registered claims.
    ///
    /// Any `alg` is accepted, no key is involved.
    ///
    /// # Errors
    ///
    /// [`TokenDecodeError::Malformed`] when `raw` is not a JWT or its claims
    /// have the wrong shape (e.g. a non-string `sub`), and
    /// [`TokenDecodeError::InvalidExpiry`] when `exp` is not a representable
    /// timestamp.
    pub fn decode_unverified(raw: &str) -> Result<Self, TokenDecodeError> {
        let data = jsonwebtoken::dangerous::insecure_decode::<Claims>(raw)?;
        let expiry = data.claims.exp.map(expiry_from_claim).transpose()?;

        Ok(Self {
            raw: SecretString::from(raw),
            header: data.header,
            claims: data.claims,
            expiry,
        })
    }

    /// The credential exactly as presented.
    #[must_use]
    pub fn raw(&self) -> &str {
        self.raw.expose_secret()
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The `sub` claim, empty when absent.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.claims.sub.as_deref().unwrap_or_default()
    }

    /// The `exp` claim, if present.
    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("alg", &self.header.alg)
            .field("sub", &self.claims.sub)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

// Far outside chrono's range, and small enough for exact float to int casts.
const MAX_ABS_EXP: f64 = 1e15;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expiry_from_claim(exp: f64) -> Result<DateTime<Utc>, TokenDecodeError> {
    if !exp.is_finite() || exp.abs() >= MAX_ABS_EXP {
        return Err(TokenDecodeError::InvalidExpiry(exp));
    }
    let secs = exp.floor();
    let nanos = ((exp - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
        .ok_or(TokenDecodeError::InvalidExpiry(exp))
}
