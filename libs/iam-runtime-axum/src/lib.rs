#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Axum integration for the IAM runtime client.
//!
//! Install [`iam_middleware`] (or [`IamLayer`]) to validate bearer
//! credentials, then take [`Iam`] in handlers to run access checks. Errors
//! render as RFC 9457 problem responses through [`IamError`].

pub mod error;
pub mod extract;
pub mod middleware;
pub mod problem;

pub use error::IamError;
pub use extract::Iam;
pub use middleware::{IamLayer, IamService, IamState, Skipper, iam_middleware};
pub use problem::Problem;
