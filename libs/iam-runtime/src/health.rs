//! Readiness of the remote runtime.
//!
//! A single probe is one `grpc.health.v1.Health/Check` call. The waiting
//! variants probe immediately and then once per poll interval until the
//! runtime is healthy, the caller cancels, or the deadline passes. An
//! interrupted wait returns the interrupt as the outer error with the last
//! observed `NotReady` error as its source, so both stay inspectable:
//!
//! ```text
//! DeadlineExceeded -> NotReady ("health check error") -> tonic::Status
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};

use crate::error::{Error, ErrorKind};
use crate::proto::health::HealthCheckRequest;
use crate::proto::health::health_check_response::ServingStatus;
use crate::runtime::RuntimeHandle;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one probe. Never cached.
#[derive(Debug, Clone)]
pub enum HealthState {
    Serving,
    /// The runtime answered with any status other than `SERVING`.
    NotServing(ServingStatus),
    /// The runtime has no health service. Counts as healthy.
    Unimplemented,
    TransportError(Status),
}

impl HealthState {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Serving | Self::Unimplemented)
    }

    /// Convert into the result reported by [`RuntimeHandle::healthy`].
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotReady`] for [`HealthState::NotServing`] and
    /// [`HealthState::TransportError`].
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Self::Serving | Self::Unimplemented => Ok(()),
            Self::NotServing(status) => {
                Err(Error::new(ErrorKind::NotReady).with_context(status.as_str_name()))
            }
            Self::TransportError(status) => {
                Err(Error::wrap(ErrorKind::NotReady, status).with_context("health check error"))
            }
        }
    }
}

impl RuntimeHandle {
    /// Run a single health check.
    ///
    /// A handle without the health capability reports
    /// [`HealthState::Unimplemented`].
    pub async fn probe(&self) -> HealthState {
        let Some(client) = self.health() else {
            return HealthState::Unimplemented;
        };

        match client.check(HealthCheckRequest::default()).await {
            Ok(resp) => match ServingStatus::try_from(resp.status) {
                Ok(ServingStatus::Serving) => HealthState::Serving,
                Ok(status) => HealthState::NotServing(status),
                Err(_) => HealthState::NotServing(ServingStatus::Unknown),
            },
            Err(status) if status.code() == Code::Unimplemented => HealthState::Unimplemented,
            Err(status) => HealthState::TransportError(status),
        }
    }

    /// Run a single health check and report it as a result.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotReady`] when the runtime is not serving or the check
    /// failed in transport.
    pub async fn healthy(&self) -> Result<(), Error> {
        self.probe().await.into_result()
    }

    /// Wait until the runtime is healthy or `cancel` fires.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Cancelled`] with the last [`ErrorKind::NotReady`] error
    /// as its source.
    pub async fn wait_healthy(&self, cancel: &CancellationToken) -> Result<(), Error> {
        self.wait(cancel, None).await
    }

    /// Wait until the runtime is healthy, `timeout` elapses or `cancel` fires.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::DeadlineExceeded`] on timeout and
    /// [`ErrorKind::Cancelled`] on cancellation, each with the last
    /// [`ErrorKind::NotReady`] error as its source.
    pub async fn wait_healthy_with_timeout(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let deadline = Instant::now().checked_add(timeout);
        self.wait(cancel, deadline).await
    }

    async fn wait(&self, cancel: &CancellationToken, deadline: Option<Instant>) -> Result<(), Error> {
        let mut last = match interruptible(self.healthy(), cancel, deadline).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(interrupt) => return Err(interrupt.compose(None)),
        };

        let period = self.health_poll_interval().max(MIN_POLL_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempt: u32 = 1;
        loop {
            tracing::debug!(attempt, error = %last, "IAM runtime not ready");

            let next = async {
                ticker.tick().await;
                self.healthy().await
            };
            match interruptible(next, cancel, deadline).await {
                Ok(Ok(())) => {
                    tracing::debug!(attempt, "IAM runtime ready");
                    return Ok(());
                }
                Ok(Err(err)) => last = err,
                Err(interrupt) => {
                    tracing::debug!(attempt, ?interrupt, "stopped waiting for IAM runtime");
                    return Err(interrupt.compose(Some(last)));
                }
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupt {
    fn compose(self, last: Option<Error>) -> Error {
        let kind = match self {
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        };
        let last = last.unwrap_or_else(|| {
            Error::new(ErrorKind::NotReady).with_context("health probe interrupted")
        });
        Error::wrap(kind, last)
    }
}

async fn interruptible<T>(
    fut: impl Future<Output = T>,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<T, Interrupt> {
    let expired = async {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupt::Cancelled),
        () = expired => Err(Interrupt::DeadlineExceeded),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::proto::health::HealthCheckResponse;
    use crate::testing::MockRuntime;

    fn status(status: ServingStatus) -> Result<HealthCheckResponse, Status> {
        Ok(HealthCheckResponse {
            status: status as i32,
        })
    }

    #[tokio::test]
    async fn test_probe_maps_responses() {
        let mock = Arc::new(MockRuntime::new());
        mock.push_health(status(ServingStatus::Serving));
        mock.push_health(status(ServingStatus::NotServing));
        mock.push_health(Err(Status::unimplemented("no health service")));
        mock.push_health(Err(Status::unavailable("connection refused")));
        mock.push_health(Ok(HealthCheckResponse { status: 42 }));
        let handle = RuntimeHandle::from_client(mock);

        assert!(matches!(handle.probe().await, HealthState::Serving));
        assert!(matches!(
            handle.probe().await,
            HealthState::NotServing(ServingStatus::NotServing)
        ));
        assert!(matches!(handle.probe().await, HealthState::Unimplemented));
        assert!(matches!(handle.probe().await, HealthState::TransportError(_)));
        assert!(matches!(
            handle.probe().await,
            HealthState::NotServing(ServingStatus::Unknown)
        ));
    }

    #[tokio::test]
    async fn test_healthy_errors_carry_reason() {
        let mock = Arc::new(MockRuntime::new());
        mock.push_health(status(ServingStatus::NotServing));
        mock.push_health(Err(Status::unavailable("connection refused")));
        let handle = RuntimeHandle::from_client(mock);

        let err = handle.healthy().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(err.context(), Some("NOT_SERVING"));
        assert!(err.find_source::<Status>().is_none());

        let err = handle.healthy().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(
            err.find_source::<Status>().map(Status::code),
            Some(Code::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_missing_health_capability_is_healthy() {
        let handle = RuntimeHandle::builder().build();

        assert!(matches!(handle.probe().await, HealthState::Unimplemented));
        handle.healthy().await.unwrap();
        handle
            .wait_healthy(&CancellationToken::new())
            .await
            .unwrap();
    }

    #[test]
    fn test_compose_without_observation_still_reports_not_ready() {
        let err = Interrupt::Cancelled.compose(None);

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.is(ErrorKind::NotReady));
    }

    #[tokio::test]
    async fn test_pre_cancelled_wait_does_not_probe() {
        let mock = Arc::new(MockRuntime::new());
        let handle = RuntimeHandle::from_client(mock.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = handle.wait_healthy(&cancel).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(mock.health_calls(), 0);
    }
}
