//! Bearer credential extraction from `Authorization` headers.

use http::HeaderMap;
use http::header::AUTHORIZATION;

use crate::error::{Error, ErrorKind};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer credential from a request's `Authorization` header.
///
/// # Errors
///
/// [`ErrorKind::MalformedCredential`] when the header is missing, not ASCII,
/// or not a bearer credential.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        Error::new(ErrorKind::MalformedCredential).with_context("missing authorization header")
    })?;
    let value = value.to_str().map_err(|e| {
        Error::wrap(ErrorKind::MalformedCredential, e).with_context("authorization header")
    })?;
    parse_bearer(value)
}

/// Strip the `Bearer ` scheme (any case) from a header value.
///
/// Surrounding whitespace is ignored. The credential itself is returned
/// untrimmed after the single separating space.
///
/// # Errors
///
/// [`ErrorKind::MalformedCredential`] when the value is too short to hold a
/// credential or uses another scheme.
pub fn parse_bearer(value: &str) -> Result<&str, Error> {
    let value = value.trim();
    if value.len() <= BEARER_PREFIX.len() {
        return Err(Error::new(ErrorKind::MalformedCredential).with_context("missing bearer token"));
    }

    match value.get(..BEARER_PREFIX.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => {
            Ok(&value[BEARER_PREFIX.len()..])
        }
        _ => Err(Error::new(ErrorKind::MalformedCredential)
            .with_context("authorization scheme is not bearer")),
    }
}
