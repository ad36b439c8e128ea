//! Error taxonomy shared by every IAM runtime operation.
//!
//! All failures are reported through a single [`Error`] type carrying an
//! [`ErrorKind`] (the leaf), optional context text and an optional cause.
//! Every kind belongs to an [`ErrorCategory`]; the [`Error`] type itself is
//! the root of the hierarchy.
//!
//! Errors compose: a cancelled readiness wait is a `Cancelled` error whose
//! source is the last `NotReady` error, whose source is the transport
//! `tonic::Status`. [`Error::is`] and [`Error::find_source`] look through the
//! whole chain, so callers match on kinds and never on rendered text.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// Boxed error used as the cause of an [`Error`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Intermediate level of the error hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Runtime lookup, readiness and cancellation.
    Runtime,
    /// Credential handling and validation.
    Auth,
    /// Access checks.
    Access,
    /// Relationship mutation.
    Relationship,
    /// Access token exchange.
    Identity,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Auth => "auth",
            Self::Access => "access",
            Self::Relationship => "relationship",
            Self::Identity => "identity",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request context carries no runtime, or the runtime lacks the
    /// capability the operation needs.
    RuntimeNotFound,
    /// The runtime did not report a serving status.
    NotReady,
    /// The caller's cancellation signal fired.
    Cancelled,
    /// A deadline derived from a caller supplied timeout expired.
    DeadlineExceeded,
    /// The configured runtime target could not be turned into a channel.
    InvalidEndpoint,

    /// The request context carries no decoded token.
    TokenNotFound,
    /// The runtime reported the credential as invalid.
    InvalidCredential,
    /// The presented credential could not be extracted or decoded.
    MalformedCredential,
    /// The credential validation request failed to execute.
    CredentialValidationRequestFailed,

    /// The runtime denied the access request.
    AccessDenied,
    /// The access check request failed to execute.
    AccessCheckFailed,
    /// Resource ID and action arguments were not supplied in pairs.
    InvalidPairing,

    /// A relationship request failed to execute.
    RelationshipRequestFailed,

    /// The access token request failed to execute.
    IdentityTokenRequestFailed,
    /// The access token returned by the runtime could not be decoded.
    AccessTokenInvalid,
}

impl ErrorKind {
    /// The category this kind belongs to.
    #[must_use]
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::RuntimeNotFound
            | Self::NotReady
            | Self::Cancelled
            | Self::DeadlineExceeded
            | Self::InvalidEndpoint => ErrorCategory::Runtime,
            Self::TokenNotFound
            | Self::InvalidCredential
            | Self::MalformedCredential
            | Self::CredentialValidationRequestFailed => ErrorCategory::Auth,
            Self::AccessDenied | Self::AccessCheckFailed | Self::InvalidPairing => {
                ErrorCategory::Access
            }
            Self::RelationshipRequestFailed => ErrorCategory::Relationship,
            Self::IdentityTokenRequestFailed | Self::AccessTokenInvalid => ErrorCategory::Identity,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RuntimeNotFound => "runtime not found",
            Self::NotReady => "not ready",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::InvalidEndpoint => "invalid endpoint",
            Self::TokenNotFound => "token not found",
            Self::InvalidCredential => "invalid credentials",
            Self::MalformedCredential => "malformed credentials",
            Self::CredentialValidationRequestFailed => "failed to execute validation request",
            Self::AccessDenied => "denied",
            Self::AccessCheckFailed => "failed to check access",
            Self::InvalidPairing => "invalid resource id and action pairs",
            Self::RelationshipRequestFailed => "failed to execute relationship request",
            Self::IdentityTokenRequestFailed => "failed to request access token",
            Self::AccessTokenInvalid => "invalid access token",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root error type for every IAM runtime operation.
#[derive(Debug, thiserror::Error)]
#[error("{}", render(.kind, .context))]
pub struct Error {
    kind: ErrorKind,
    context: Option<Cow<'static, str>>,
    #[source]
    source: Option<BoxError>,
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)] // shape fixed by the derive
fn render(kind: &ErrorKind, context: &Option<Cow<'static, str>>) -> String {
    match context {
        Some(context) => format!("iam-runtime error: {}: {kind}: {context}", kind.category()),
        None => format!("iam-runtime error: {}: {kind}", kind.category()),
    }
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Attach `kind` to an underlying cause.
    pub fn wrap(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self::new(kind).with_source(source)
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The outermost kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Every kind in the chain, outermost first.
    pub fn kinds(&self) -> impl Iterator<Item = ErrorKind> + '_ {
        self.chain()
            .filter_map(|err| err.downcast_ref::<Self>())
            .map(Self::kind)
    }

    /// Whether `kind` appears anywhere in the chain.
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kinds().any(|k| k == kind)
    }

    /// Whether any kind in the chain belongs to `category`.
    #[must_use]
    pub fn is_category(&self, category: ErrorCategory) -> bool {
        self.kinds().any(|k| k.category() == category)
    }

    /// First cause of type `T` in the chain, e.g. the transport `tonic::Status`.
    #[must_use]
    pub fn find_source<T: StdError + 'static>(&self) -> Option<&T> {
        self.chain().find_map(|err| err.downcast_ref::<T>())
    }

    /// The full chain rendered as `outer: inner: ...`.
    #[must_use]
    pub fn report(&self) -> String {
        self.chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }

    fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(Some(self as &(dyn StdError + 'static)), |err| (*err).source())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
