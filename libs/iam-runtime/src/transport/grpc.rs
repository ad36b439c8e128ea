use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::{Response, Status, Streaming};

use crate::api::{AuthenticationClient, AuthorizationClient, HealthClient, IdentityClient};
use crate::proto::authentication::authentication_client::AuthenticationClient as AuthenticationGrpcClient;
use crate::proto::authentication::{ValidateCredentialRequest, ValidateCredentialResponse};
use crate::proto::authorization::authorization_client::AuthorizationClient as AuthorizationGrpcClient;
use crate::proto::authorization::{
    CheckAccessRequest, CheckAccessResponse, CreateRelationshipsRequest,
    CreateRelationshipsResponse, DeleteRelationshipsRequest, DeleteRelationshipsResponse,
};
use crate::proto::health::health_client::HealthClient as HealthGrpcClient;
use crate::proto::health::{HealthCheckRequest, HealthCheckResponse};
use crate::proto::identity::identity_client::IdentityClient as IdentityGrpcClient;
use crate::proto::identity::{GetAccessTokenRequest, GetAccessTokenResponse};

/// Every runtime capability over one gRPC channel.
///
/// Each call builds its generated client on a clone of the channel, which is
/// cheap and lets calls proceed concurrently.
#[derive(Debug, Clone)]
pub struct GrpcRuntime {
    channel: Channel,
}

impl GrpcRuntime {
    /// Wrap an existing channel, e.g. one configured with TLS.
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Stream serving status changes for `service` (empty for the whole
    /// runtime).
    ///
    /// # Errors
    ///
    /// Any transport or remote failure when opening the stream.
    pub async fn watch_health(
        &self,
        service: impl Into<String>,
    ) -> Result<Streaming<HealthCheckResponse>, Status> {
        let request = HealthCheckRequest {
            service: service.into(),
        };
        self.health()
            .watch(request)
            .await
            .map(Response::into_inner)
    }

    fn authentication(&self) -> AuthenticationGrpcClient<Channel> {
        AuthenticationGrpcClient::new(self.channel.clone())
    }

    fn authorization(&self) -> AuthorizationGrpcClient<Channel> {
        AuthorizationGrpcClient::new(self.channel.clone())
    }

    fn identity(&self) -> IdentityGrpcClient<Channel> {
        IdentityGrpcClient::new(self.channel.clone())
    }

    fn health(&self) -> HealthGrpcClient<Channel> {
        HealthGrpcClient::new(self.channel.clone())
    }
}

#[async_trait]
impl AuthenticationClient for GrpcRuntime {
    #[tracing::instrument(skip_all)]
    async fn validate_credential(
        &self,
        request: ValidateCredentialRequest,
    ) -> Result<ValidateCredentialResponse, Status> {
        self.authentication()
            .validate_credential(request)
            .await
            .map(Response::into_inner)
    }
}

#[async_trait]
impl AuthorizationClient for GrpcRuntime {
    #[tracing::instrument(skip_all, fields(actions = request.actions.len()))]
    async fn check_access(
        &self,
        request: CheckAccessRequest,
    ) -> Result<CheckAccessResponse, Status> {
        self.authorization()
            .check_access(request)
            .await
            .map(Response::into_inner)
    }

    #[tracing::instrument(skip_all, fields(resource_id = %request.resource_id))]
    async fn create_relationships(
        &self,
        request: CreateRelationshipsRequest,
    ) -> Result<CreateRelationshipsResponse, Status> {
        self.authorization()
            .create_relationships(request)
            .await
            .map(Response::into_inner)
    }

    #[tracing::instrument(skip_all, fields(resource_id = %request.resource_id))]
    async fn delete_relationships(
        &self,
        request: DeleteRelationshipsRequest,
    ) -> Result<DeleteRelationshipsResponse, Status> {
        self.authorization()
            .delete_relationships(request)
            .await
            .map(Response::into_inner)
    }
}

#[async_trait]
impl IdentityClient for GrpcRuntime {
    #[tracing::instrument(skip_all)]
    async fn get_access_token(
        &self,
        request: GetAccessTokenRequest,
    ) -> Result<GetAccessTokenResponse, Status> {
        self.identity()
            .get_access_token(request)
            .await
            .map(Response::into_inner)
    }
}

#[async_trait]
impl HealthClient for GrpcRuntime {
    async fn check(&self, request: HealthCheckRequest) -> Result<HealthCheckResponse, Status> {
        self.health()
            .check(request)
            .await
            .map(Response::into_inner)
    }
}
