#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Client pipeline for the IAM runtime.
//!
//! A [`RuntimeHandle`] composes the runtime's capabilities (authentication,
//! authorization, identity, health). A [`RequestContext`] carries the handle,
//! the caller's decoded credential and subject through a request, and
//! exposes the access-control operations:
//!
//! ```ignore
//! let runtime = GrpcRuntime::connect(&RuntimeConfig::from_env(), &cancel).await?;
//!
//! let ctx = RequestContext::new()
//!     .with_runtime(runtime)
//!     .with_token(Token::decode_unverified(credential)?)
//!     .with_subject(subject);
//!
//! ctx.validate_credential(credential).await?;
//! ctx.check_access_to(&["loadbal-1", "loadbalancer_update"]).await?;
//! ```
//!
//! Every failure is an [`Error`] whose [`ErrorKind`] can be inspected through
//! any amount of wrapping.

pub mod api;
mod authentication;
mod authorization;
pub mod config;
pub mod context;
pub mod error;
pub mod headers;
pub mod health;
pub mod proto;
pub mod runtime;
pub mod token;
pub mod transport;


#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{AuthenticationClient, AuthorizationClient, HealthClient, IdentityClient};
pub use config::RuntimeConfig;
pub use context::RequestContext;
pub use error::{BoxError, Error, ErrorCategory, ErrorKind};
pub use headers::{bearer_token, parse_bearer};
pub use health::HealthState;
pub use proto::authorization::{AccessRequestAction, Relationship};
pub use runtime::{Capabilities, Capability, RuntimeHandle, RuntimeHandleBuilder};
pub use token::{Claims, Token, TokenDecodeError};
pub use transport::GrpcRuntime;
