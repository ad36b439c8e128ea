#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(unix)]

//! gRPC transport against an address nobody listens on.

use std::time::Duration;

use iam_runtime::{ErrorKind, GrpcRuntime, HealthState, RuntimeConfig};
use tokio_util::sync::CancellationToken;

fn missing_socket() -> String {
    let path = std::env::temp_dir().join(format!("iam-runtime-missing-{}.sock", std::process::id()));
    format!("unix://{}", path.display())
}

#[tokio::test]
async fn connect_without_wait_is_lazy() {
    let config = RuntimeConfig {
        target: missing_socket(),
        wait_timeout: Duration::ZERO,
        ..RuntimeConfig::default()
    };

    let handle = GrpcRuntime::connect(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(handle.probe().await, HealthState::TransportError(_)));
    let err = handle.healthy().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotReady);
    assert!(err.find_source::<tonic::Status>().is_some());
}

#[tokio::test]
async fn connect_times_out_against_missing_socket() {
    let config = RuntimeConfig {
        target: missing_socket(),
        wait_timeout: Duration::from_millis(300),
        health_poll_interval: Duration::from_millis(50),
        ..RuntimeConfig::default()
    };
    let start = std::time::Instant::now();

    let err = GrpcRuntime::connect(&config, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    assert!(err.is(ErrorKind::NotReady));
}

#[tokio::test]
async fn connect_honours_cancellation() {
    let config = RuntimeConfig {
        target: missing_socket(),
        wait_timeout: Duration::from_secs(30),
        health_poll_interval: Duration::from_millis(50),
        ..RuntimeConfig::default()
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = GrpcRuntime::connect(&config, &cancel).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(err.is(ErrorKind::NotReady));
}

#[tokio::test]
async fn unusable_target_fails_fast() {
    let config = RuntimeConfig {
        target: "ftp://iam:21".to_owned(),
        ..RuntimeConfig::default()
    };

    let err = GrpcRuntime::connect(&config, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidEndpoint);
}
