#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the IAM middleware and extractor.
//!
//! These tests verify that:
//! 1. Requests without a usable bearer credential never reach the runtime
//! 2. Validated requests reach handlers with a populated `RequestContext`
//! 3. Runtime decisions and failures map to problem responses
//! 4. The function middleware and the tower layer behave the same
//! 5. Skipped requests reach handlers without touching the runtime

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post, put},
};
use iam_runtime::proto::authentication::ValidateCredentialResponse;
use iam_runtime::proto::authentication::validate_credential_response::Result as ValidateResult;
use iam_runtime::proto::authorization::{
    CheckAccessResponse, CreateRelationshipsRequest, Relationship,
};
use iam_runtime::proto::authorization::check_access_response::Result as CheckResult;
use iam_runtime::testing::{MockRuntime, test_jwt, test_jwt_with_alg};
use iam_runtime::{Capability, RuntimeHandle};
use iam_runtime_axum::{Iam, IamError, IamLayer, IamState, Problem, iam_middleware};
use jsonwebtoken::Algorithm;
use serde_json::json;
use tower::ServiceExt;

async fn whoami(iam: Iam) -> String {
    iam.subject().to_owned()
}

async fn update(iam: Iam) -> Result<StatusCode, IamError> {
    iam.check_access_to(&["loadbal-1", "loadbalancer_update"])
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn grant(iam: Iam) -> Result<StatusCode, IamError> {
    let subject = iam.subject().to_owned();
    iam.create_relationships(CreateRelationshipsRequest::new(
        "loadbal-1",
        vec![Relationship::new("owner", subject)],
    ))
    .await?;
    Ok(StatusCode::CREATED)
}

async fn open() -> &'static str {
    "ok"
}

fn routes() -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/loadbalancers", put(update))
        .route("/loadbalancers/owners", post(grant))
        .route("/open", get(open).options(open))
}

fn app(mock: &Arc<MockRuntime>) -> Router {
    let state = IamState::new(RuntimeHandle::from_client(mock.clone())).unwrap();
    routes().layer(from_fn_with_state(state, iam_middleware))
}

fn layered_app(mock: &Arc<MockRuntime>) -> Router {
    let state = IamState::new(RuntimeHandle::from_client(mock.clone())).unwrap();
    routes().layer(IamLayer::new(state))
}

fn skip_open(req: &Request<Body>) -> bool {
    req.uri().path() == "/open"
}

fn credential() -> String {
    test_jwt(&json!({ "sub": "user-1", "exp": 4_102_444_800_i64 }))
}

fn request(method: Method, uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn problem(response: Response) -> Result<Problem> {
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn text(response: Response) -> Result<String> {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(body.to_vec())?)
}

#[tokio::test]
async fn missing_or_malformed_credentials_are_unauthorized() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());

    for authorization in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer "), Some("Bearer not-a-jwt")] {
        let response = app(&mock)
            .oneshot(request(Method::GET, "/whoami", authorization))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{authorization:?}");
        let problem = problem(response).await?;
        assert_eq!(problem.status, 401);
        assert_eq!(problem.code.as_deref(), Some("malformed_credential"));
    }

    assert_eq!(mock.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn validated_request_reaches_handler() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    let credential = credential();

    let response = app(&mock)
        .oneshot(request(
            Method::GET,
            "/whoami",
            Some(&format!("bearer {credential}")),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await?, "user-1");

    let validated = mock.validate_credential_requests();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].credential, credential);
    Ok(())
}

#[tokio::test]
async fn invalid_credential_is_unauthorized() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    mock.push_validate_credential(Ok(ValidateCredentialResponse {
        result: ValidateResult::Invalid as i32,
    }));

    let response = app(&mock)
        .oneshot(request(
            Method::GET,
            "/whoami",
            Some(&format!("Bearer {}", credential())),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        problem(response).await?.code.as_deref(),
        Some("invalid_credential")
    );
    assert_eq!(mock.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn validation_transport_failure_is_internal_error() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    mock.push_validate_credential(Err(tonic::Status::unavailable("socket closed")));

    let response = app(&mock)
        .oneshot(request(
            Method::GET,
            "/whoami",
            Some(&format!("Bearer {}", credential())),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let problem = problem(response).await?;
    assert_eq!(problem.detail, "Internal authentication error");
    #[cfg(not(feature = "debug-errors"))]
    assert!(problem.debug.is_none());
    Ok(())
}

#[tokio::test]
async fn access_check_outcomes_map_to_status() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    mock.push_check_access(Ok(CheckAccessResponse {
        result: CheckResult::Allowed as i32,
    }));
    mock.push_check_access(Ok(CheckAccessResponse {
        result: CheckResult::Denied as i32,
    }));
    mock.push_check_access(Err(tonic::Status::internal("backend exploded")));
    let authorization = format!("Bearer {}", credential());

    let expected = [
        StatusCode::NO_CONTENT,
        StatusCode::FORBIDDEN,
        StatusCode::INTERNAL_SERVER_ERROR,
    ];
    for status in expected {
        let response = app(&mock)
            .oneshot(request(Method::PUT, "/loadbalancers", Some(&authorization)))
            .await?;
        assert_eq!(response.status(), status);
    }

    let checks = mock.check_access_requests();
    assert_eq!(checks.len(), 3);
    assert_eq!(checks[0].actions.len(), 1);
    assert_eq!(checks[0].actions[0].resource_id, "loadbal-1");
    assert_eq!(checks[0].actions[0].action, "loadbalancer_update");
    Ok(())
}

#[tokio::test]
async fn preflight_skips_authentication() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/open")
        .header(header::ORIGIN, "https://console.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())?;
    let response = app(&mock).oneshot(req).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn extractor_without_middleware_is_internal_error() -> Result<()> {
    let response = routes()
        .oneshot(request(Method::GET, "/whoami", None))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        problem(response).await?.code.as_deref(),
        Some("runtime_not_found")
    );
    Ok(())
}

#[tokio::test]
async fn tower_layer_matches_function_middleware() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());

    let response = layered_app(&mock)
        .oneshot(request(Method::GET, "/whoami", None))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = layered_app(&mock)
        .oneshot(request(
            Method::GET,
            "/whoami",
            Some(&format!("Bearer {}", credential())),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await?, "user-1");
    assert_eq!(mock.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_state_aborts_validation() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let state = IamState::new(RuntimeHandle::from_client(mock.clone()))?.with_cancellation(cancel);
    assert!(state.runtime().supports(Capability::Authentication));

    let response = routes()
        .layer(from_fn_with_state(state, iam_middleware))
        .oneshot(request(
            Method::GET,
            "/whoami",
            Some(&format!("Bearer {}", credential())),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        problem(response).await?.code.as_deref(),
        Some("credential_validation_failed")
    );
    Ok(())
}

#[tokio::test]
async fn handlers_create_relationships_for_subject() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    mock.push_create_relationships(Err(tonic::Status::unavailable("retry later")));
    let authorization = format!("Bearer {}", credential());

    let response = app(&mock)
        .oneshot(request(Method::POST, "/loadbalancers/owners", Some(&authorization)))
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app(&mock)
        .oneshot(request(Method::POST, "/loadbalancers/owners", Some(&authorization)))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = mock.create_relationships_requests();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].resource_id, "loadbal-1");
    assert_eq!(created[1].relationships, vec![Relationship::new("owner", "user-1")]);
    Ok(())
}

#[tokio::test]
async fn asymmetric_credentials_reach_handler() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());

    for alg in [Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA] {
        let credential = test_jwt_with_alg(alg, &json!({ "sub": "user-2", "exp": 4_102_444_800_i64 }));

        for router in [app(&mock), layered_app(&mock)] {
            let response = router
                .oneshot(request(
                    Method::GET,
                    "/whoami",
                    Some(&format!("Bearer {credential}")),
                ))
                .await?;

            assert_eq!(response.status(), StatusCode::OK, "{alg:?}");
            assert_eq!(text(response).await?, "user-2");
        }
    }

    let validated = mock.validate_credential_requests();
    assert_eq!(validated.len(), 6);
    Ok(())
}

#[tokio::test]
async fn custom_skipper_bypasses_authentication() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    let state = IamState::new(RuntimeHandle::from_client(mock.clone()))?.with_skipper(skip_open);

    let function = routes().layer(from_fn_with_state(state.clone(), iam_middleware));
    let layered = routes().layer(IamLayer::new(state));

    for router in [function, layered] {
        let response = router
            .clone()
            .oneshot(request(Method::GET, "/open", None))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await?, "ok");

        let response = router
            .oneshot(request(Method::GET, "/whoami", None))
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(mock.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn custom_skipper_replaces_preflight_skip() -> Result<()> {
    let mock = Arc::new(MockRuntime::new());
    let state = IamState::new(RuntimeHandle::from_client(mock.clone()))?.with_skipper(|_: &Request<Body>| false);

    let preflight = || {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/open")
            .header(header::ORIGIN, "https://console.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
    };

    let response = routes()
        .layer(from_fn_with_state(state.clone(), iam_middleware))
        .oneshot(preflight()?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = routes()
        .layer(IamLayer::new(state))
        .oneshot(preflight()?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(mock.calls(), 0);
    Ok(())
}
