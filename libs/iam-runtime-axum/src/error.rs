//! HTTP translation of IAM runtime errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iam_runtime::{Error, ErrorKind};

use crate::problem::Problem;

/// [`Error`] rendered as a problem response.
///
/// The status and a generic detail are derived from the outermost
/// [`ErrorKind`]. The error chain never reaches the client unless the
/// `debug-errors` feature is enabled.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct IamError(#[from] Error);

impl IamError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        describe(self.kind()).0
    }

    #[must_use]
    pub fn inner(&self) -> &Error {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Error {
        self.0
    }

    /// Problem body sent for this error.
    #[must_use]
    pub fn problem(&self) -> Problem {
        let (status, code, detail) = describe(self.kind());
        let title = status.canonical_reason().unwrap_or("Error");
        Problem {
            debug: cfg!(feature = "debug-errors").then(|| self.0.report()),
            ..Problem::new(status, title, detail).with_code(code)
        }
    }
}

impl IntoResponse for IamError {
    fn into_response(self) -> Response {
        log_iam_error(&self);
        self.problem().into_response()
    }
}

/// Status, error code and client-facing detail for `kind`.
#[must_use]
pub fn describe(kind: ErrorKind) -> (StatusCode, &'static str, &'static str) {
    match kind {
        ErrorKind::TokenNotFound => (
            StatusCode::BAD_REQUEST,
            "token_not_found",
            "Request carries no credential",
        ),
        ErrorKind::InvalidPairing => (
            StatusCode::BAD_REQUEST,
            "invalid_pairing",
            "Invalid access request",
        ),
        ErrorKind::InvalidCredential => (
            StatusCode::UNAUTHORIZED,
            "invalid_credential",
            "Authentication failed",
        ),
        ErrorKind::MalformedCredential => (
            StatusCode::UNAUTHORIZED,
            "malformed_credential",
            "Missing or invalid Authorization header",
        ),
        ErrorKind::AccessDenied => (StatusCode::FORBIDDEN, "access_denied", "Access denied"),
        ErrorKind::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            "not_ready",
            "IAM runtime unavailable",
        ),
        ErrorKind::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "cancelled",
            "Request cancelled",
        ),
        ErrorKind::DeadlineExceeded => (
            StatusCode::SERVICE_UNAVAILABLE,
            "deadline_exceeded",
            "IAM runtime did not respond in time",
        ),
        ErrorKind::RuntimeNotFound => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "runtime_not_found",
            "IAM runtime not configured",
        ),
        ErrorKind::InvalidEndpoint => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "invalid_endpoint",
            "IAM runtime not configured",
        ),
        ErrorKind::CredentialValidationRequestFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "credential_validation_failed",
            "Internal authentication error",
        ),
        ErrorKind::AccessCheckFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "access_check_failed",
            "Internal authorization error",
        ),
        ErrorKind::RelationshipRequestFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "relationship_request_failed",
            "Internal authorization error",
        ),
        ErrorKind::IdentityTokenRequestFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "identity_token_request_failed",
            "Internal identity error",
        ),
        ErrorKind::AccessTokenInvalid => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "access_token_invalid",
            "Internal identity error",
        ),
    }
}

/// Client errors are routine; server errors mean the runtime or its
/// configuration is broken.
///
/// Cognitive complexity is inflated by tracing macro expansion.
#[allow(clippy::cognitive_complexity)]
fn log_iam_error(err: &IamError) {
    let status = err.status();
    let report = err.inner().report();
    if status.is_server_error() {
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(status = status.as_u16(), "IAM runtime unavailable: {report}");
        } else {
            tracing::error!(status = status.as_u16(), "IAM request failed: {report}");
        }
    } else {
        tracing::debug!(status = status.as_u16(), "IAM rejected request: {report}");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ErrorKind::TokenNotFound, StatusCode::BAD_REQUEST),
            (ErrorKind::InvalidPairing, StatusCode::BAD_REQUEST),
            (ErrorKind::InvalidCredential, StatusCode::UNAUTHORIZED),
            (ErrorKind::MalformedCredential, StatusCode::UNAUTHORIZED),
            (ErrorKind::AccessDenied, StatusCode::FORBIDDEN),
            (ErrorKind::NotReady, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::DeadlineExceeded, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::RuntimeNotFound, StatusCode::INTERNAL_SERVER_ERROR),
            (ErrorKind::InvalidEndpoint, StatusCode::INTERNAL_SERVER_ERROR),
            (
                ErrorKind::CredentialValidationRequestFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ErrorKind::AccessCheckFailed, StatusCode::INTERNAL_SERVER_ERROR),
            (
                ErrorKind::RelationshipRequestFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ErrorKind::IdentityTokenRequestFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ErrorKind::AccessTokenInvalid, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (kind, status) in cases {
            assert_eq!(IamError::from(Error::new(kind)).status(), status, "{kind}");
        }
    }

    #[test]
    fn test_outermost_kind_decides_status() {
        let err = Error::wrap(
            ErrorKind::DeadlineExceeded,
            Error::wrap(ErrorKind::NotReady, tonic::Status::unavailable("down")),
        );

        let err = IamError::from(err);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.problem().code.as_deref(), Some("deadline_exceeded"));
    }

    #[cfg(not(feature = "debug-errors"))]
    #[test]
    fn test_problem_hides_error_chain() {
        let err = IamError::from(
            Error::wrap(
                ErrorKind::AccessCheckFailed,
                tonic::Status::internal("secret backend detail"),
            )
            .with_context("loadbal-1"),
        );

        let problem = err.problem();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.title, "Internal Server Error");
        assert_eq!(problem.detail, "Internal authorization error");
        assert!(problem.debug.is_none());
        assert!(!serde_json::to_string(&problem).unwrap().contains("secret"));
    }

    #[cfg(feature = "debug-errors")]
    #[test]
    fn test_problem_exposes_error_chain() {
        let err = IamError::from(Error::wrap(
            ErrorKind::AccessCheckFailed,
            tonic::Status::internal("backend detail"),
        ));

        let debug = err.problem().debug.unwrap();
        assert!(debug.contains("backend detail"));
    }
}
