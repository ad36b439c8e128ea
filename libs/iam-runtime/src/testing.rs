//! Scripted in-memory runtime for tests.
//!
//! [`MockRuntime`] implements every capability trait. Each RPC answers from
//! a queue of scripted results and falls back to a sticky default once the
//! queue is empty. Requests are recorded for assertions.
//!
//! Defaults: credentials are valid, access is allowed, relationship calls
//! succeed, health is `SERVING`, and access token requests fail with
//! `UNAVAILABLE` until scripted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::Value;
use tonic::Status;

use crate::api::{AuthenticationClient, AuthorizationClient, HealthClient, IdentityClient};
use crate::proto::authentication::{ValidateCredentialRequest, ValidateCredentialResponse};
use crate::proto::authorization::{
    CheckAccessRequest, CheckAccessResponse, CreateRelationshipsRequest,
    CreateRelationshipsResponse, DeleteRelationshipsRequest, DeleteRelationshipsResponse,
};
use crate::proto::health::health_check_response::ServingStatus;
use crate::proto::health::{HealthCheckRequest, HealthCheckResponse};
use crate::proto::identity::{GetAccessTokenRequest, GetAccessTokenResponse};
use crate::token::Token;

/// Sign `claims` with a throwaway key. The signature is never checked.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_jwt(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(b"iam-runtime-testing"),
    )
    .expect("claims serialize to a JWT")
}

/// JWT for `claims` whose header names `alg`, with a placeholder signature.
///
/// Stands in for credentials issued with keys the test does not hold, e.g.
/// `RS256` or `ES256` tokens from a real runtime.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_jwt_with_alg(alg: Algorithm, claims: &Value) -> String {
    let header = serde_json::to_vec(&Header::new(alg)).expect("header serializes");
    let claims = serde_json::to_vec(claims).expect("claims serialize");
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims),
        URL_SAFE_NO_PAD.encode(b"not-a-real-signature"),
    )
}

/// Decoded [`Token`] for `claims`.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_token(claims: &Value) -> Token {
    Token::decode_unverified(&test_jwt(claims)).expect("freshly encoded JWT decodes")
}

struct Script<T> {
    queue: VecDeque<Result<T, Status>>,
    fallback: Result<T, Status>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, Status>) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> Result<T, Status> {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

struct State {
    validate_credential: Script<ValidateCredentialResponse>,
    check_access: Script<CheckAccessResponse>,
    create_relationships: Script<CreateRelationshipsResponse>,
    delete_relationships: Script<DeleteRelationshipsResponse>,
    get_access_token: Script<GetAccessTokenResponse>,
    health: Script<HealthCheckResponse>,

    validate_credential_requests: Vec<ValidateCredentialRequest>,
    check_access_requests: Vec<CheckAccessRequest>,
    create_relationships_requests: Vec<CreateRelationshipsRequest>,
    delete_relationships_requests: Vec<DeleteRelationshipsRequest>,
}

/// Scripted runtime. See the module docs for defaults.
pub struct MockRuntime {
    state: Mutex<State>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    get_access_token_calls: AtomicUsize,
    health_calls: AtomicUsize,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                validate_credential: Script::new(Ok(ValidateCredentialResponse::default())),
                check_access: Script::new(Ok(CheckAccessResponse::default())),
                create_relationships: Script::new(Ok(CreateRelationshipsResponse::default())),
                delete_relationships: Script::new(Ok(DeleteRelationshipsResponse::default())),
                get_access_token: Script::new(Err(Status::unavailable("no access token scripted"))),
                health: Script::new(Ok(HealthCheckResponse {
                    status: ServingStatus::Serving as i32,
                })),
                validate_credential_requests: Vec::new(),
                check_access_requests: Vec::new(),
                create_relationships_requests: Vec::new(),
                delete_relationships_requests: Vec::new(),
            }),
            latency: Mutex::new(None),
            calls: AtomicUsize::new(0),
            get_access_token_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every response by `latency` (uses Tokio time, so paused clocks
    /// apply).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn push_validate_credential(&self, result: Result<ValidateCredentialResponse, Status>) {
        self.state.lock().validate_credential.queue.push_back(result);
    }

    pub fn set_validate_credential(&self, result: Result<ValidateCredentialResponse, Status>) {
        self.state.lock().validate_credential.fallback = result;
    }

    pub fn push_check_access(&self, result: Result<CheckAccessResponse, Status>) {
        self.state.lock().check_access.queue.push_back(result);
    }

    pub fn set_check_access(&self, result: Result<CheckAccessResponse, Status>) {
        self.state.lock().check_access.fallback = result;
    }

    pub fn push_create_relationships(&self, result: Result<CreateRelationshipsResponse, Status>) {
        self.state.lock().create_relationships.queue.push_back(result);
    }

    pub fn push_delete_relationships(&self, result: Result<DeleteRelationshipsResponse, Status>) {
        self.state.lock().delete_relationships.queue.push_back(result);
    }

    pub fn push_get_access_token(&self, result: Result<GetAccessTokenResponse, Status>) {
        self.state.lock().get_access_token.queue.push_back(result);
    }

    pub fn set_get_access_token(&self, result: Result<GetAccessTokenResponse, Status>) {
        self.state.lock().get_access_token.fallback = result;
    }

    pub fn push_health(&self, result: Result<HealthCheckResponse, Status>) {
        self.state.lock().health.queue.push_back(result);
    }

    pub fn set_health(&self, result: Result<HealthCheckResponse, Status>) {
        self.state.lock().health.fallback = result;
    }

    /// Total calls across every RPC.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn get_access_token_calls(&self) -> usize {
        self.get_access_token_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn validate_credential_requests(&self) -> Vec<ValidateCredentialRequest> {
        self.state.lock().validate_credential_requests.clone()
    }

    #[must_use]
    pub fn check_access_requests(&self) -> Vec<CheckAccessRequest> {
        self.state.lock().check_access_requests.clone()
    }

    #[must_use]
    pub fn create_relationships_requests(&self) -> Vec<CreateRelationshipsRequest> {
        self.state.lock().create_relationships_requests.clone()
    }

    #[must_use]
    pub fn delete_relationships_requests(&self) -> Vec<DeleteRelationshipsRequest> {
        self.state.lock().delete_relationships_requests.clone()
    }

    async fn respond<T>(&self, result: Result<T, Status>) -> Result<T, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        result
    }
}

#[async_trait]
impl AuthenticationClient for MockRuntime {
    async fn validate_credential(
        &self,
        request: ValidateCredentialRequest,
    ) -> Result<ValidateCredentialResponse, Status> {
        let result = {
            let mut state = self.state.lock();
            state.validate_credential_requests.push(request);
            state.validate_credential.next()
        };
        self.respond(result).await
    }
}

#[async_trait]
impl AuthorizationClient for MockRuntime {
    async fn check_access(
        &self,
        request: CheckAccessRequest,
    ) -> Result<CheckAccessResponse, Status> {
        let result = {
            let mut state = self.state.lock();
            state.check_access_requests.push(request);
            state.check_access.next()
        };
        self.respond(result).await
    }

    async fn create_relationships(
        &self,
        request: CreateRelationshipsRequest,
    ) -> Result<CreateRelationshipsResponse, Status> {
        let result = {
            let mut state = self.state.lock();
            state.create_relationships_requests.push(request);
            state.create_relationships.next()
        };
        self.respond(result).await
    }

    async fn delete_relationships(
        &self,
        request: DeleteRelationshipsRequest,
    ) -> Result<DeleteRelationshipsResponse, Status> {
        let result = {
            let mut state = self.state.lock();
            state.delete_relationships_requests.push(request);
            state.delete_relationships.next()
        };
        self.respond(result).await
    }
}

#[async_trait]
impl IdentityClient for MockRuntime {
    async fn get_access_token(
        &self,
        _request: GetAccessTokenRequest,
    ) -> Result<GetAccessTokenResponse, Status> {
        self.get_access_token_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.state.lock().get_access_token.next();
        self.respond(result).await
    }
}

#[async_trait]
impl HealthClient for MockRuntime {
    async fn check(&self, _request: HealthCheckRequest) -> Result<HealthCheckResponse, Status> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.state.lock().health.next();
        self.respond(result).await
    }
}
