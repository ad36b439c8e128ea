//! Capability traits a runtime handle is composed of.
//!
//! Each trait mirrors one remote service. The gRPC transport implements all
//! four; tests and embedders may implement any subset and assemble a
//! [`RuntimeHandle`](crate::RuntimeHandle) from what they have.
//!
//! Transport failures are reported as [`tonic::Status`] so the status code
//! (notably `UNIMPLEMENTED` for health checks) stays inspectable.

use async_trait::async_trait;
use tonic::Status;

use crate::proto::authentication::{ValidateCredentialRequest, ValidateCredentialResponse};
use crate::proto::authorization::{
    CheckAccessRequest, CheckAccessResponse, CreateRelationshipsRequest,
    CreateRelationshipsResponse, DeleteRelationshipsRequest, DeleteRelationshipsResponse,
};
use crate::proto::health::{HealthCheckRequest, HealthCheckResponse};
use crate::proto::identity::{GetAccessTokenRequest, GetAccessTokenResponse};

/// Credential validation.
#[async_trait]
pub trait AuthenticationClient: Send + Sync {
    /// Ask the runtime whether a raw credential is valid.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure.
    async fn validate_credential(
        &self,
        request: ValidateCredentialRequest,
    ) -> Result<ValidateCredentialResponse, Status>;
}

/// Access checks and relationship mutation.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Check a batch of (resource, action) pairs for a credential.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure.
    async fn check_access(
        &self,
        request: CheckAccessRequest,
    ) -> Result<CheckAccessResponse, Status>;

    /// Create relationships from a resource to subjects.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure.
    async fn create_relationships(
        &self,
        request: CreateRelationshipsRequest,
    ) -> Result<CreateRelationshipsResponse, Status>;

    /// Delete relationships from a resource to subjects.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure.
    async fn delete_relationships(
        &self,
        request: DeleteRelationshipsRequest,
    ) -> Result<DeleteRelationshipsResponse, Status>;
}

/// Access token issuance for this workload.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Request a short lived access token.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure.
    async fn get_access_token(
        &self,
        request: GetAccessTokenRequest,
    ) -> Result<GetAccessTokenResponse, Status>;
}

/// Standard gRPC health checking.
#[async_trait]
pub trait HealthClient: Send + Sync {
    /// Single health check.
    ///
    /// # Errors
    ///
    /// Any transport or remote failure, including `UNIMPLEMENTED` when the
    /// backend has no health service.
    async fn check(&self, request: HealthCheckRequest) -> Result<HealthCheckResponse, Status>;
}
