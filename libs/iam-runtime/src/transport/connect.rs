use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use super::GrpcRuntime;
use crate::config::RuntimeConfig;
use crate::error::{Error, ErrorKind};
use crate::runtime::RuntimeHandle;

/// Where the runtime listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// `http://` or `https://` URI.
    Uri(String),
}

impl Target {
    /// Parse a runtime address.
    ///
    /// Accepted forms: `unix:///abs/path`, `unix:rel/path`, `/abs/path`,
    /// `http(s)://host:port` and bare `host:port`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidEndpoint`] for empty targets and unsupported
    /// schemes.
    pub fn parse(target: &str) -> Result<Self, Error> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::new(ErrorKind::InvalidEndpoint).with_context("empty target"));
        }

        if let Some(path) = target
            .strip_prefix("unix://")
            .or_else(|| target.strip_prefix("unix:"))
        {
            if path.is_empty() {
                return Err(
                    Error::new(ErrorKind::InvalidEndpoint).with_context("empty unix socket path")
                );
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if target.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(target)));
        }

        match target.split_once("://") {
            Some(("http" | "https", _)) => Ok(Self::Uri(target.to_owned())),
            Some((scheme, _)) => Err(Error::new(ErrorKind::InvalidEndpoint)
                .with_context(format!("unsupported scheme {scheme:?}"))),
            None => Ok(Self::Uri(format!("http://{target}"))),
        }
    }
}

/// Build a lazily connecting channel to `target`.
///
/// Nothing is dialled until the first call. Must be called from within a
/// Tokio runtime.
///
/// # Errors
///
/// [`ErrorKind::InvalidEndpoint`] when the URI is invalid or Unix sockets are
/// not available on this platform.
pub fn channel(target: &Target, request_timeout: Option<Duration>) -> Result<Channel, Error> {
    match target {
        Target::Uri(uri) => {
            let endpoint = Endpoint::from_shared(uri.clone())
                .map_err(|e| Error::wrap(ErrorKind::InvalidEndpoint, e).with_context(uri.clone()))?;
            Ok(with_timeout(endpoint, request_timeout).connect_lazy())
        }
        Target::Unix(path) => unix_channel(path, request_timeout),
    }
}

#[cfg(unix)]
fn unix_channel(path: &std::path::Path, request_timeout: Option<Duration>) -> Result<Channel, Error> {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;

    // The URI is required by the endpoint but never dialled.
    let endpoint = Endpoint::from_static("http://[::]:50051");
    let path = Arc::new(path.to_path_buf());

    let connector = tower::service_fn(move |_: http::Uri| {
        let path = Arc::clone(&path);
        async move {
            let stream = UnixStream::connect(path.as_path()).await?;
            Ok::<_, std::io::Error>(TokioIo::new(stream))
        }
    });

    Ok(with_timeout(endpoint, request_timeout).connect_with_connector_lazy(connector))
}

#[cfg(not(unix))]
fn unix_channel(path: &std::path::Path, _: Option<Duration>) -> Result<Channel, Error> {
    Err(Error::new(ErrorKind::InvalidEndpoint)
        .with_context(format!("unix sockets are not supported here: {}", path.display())))
}

fn with_timeout(endpoint: Endpoint, timeout: Option<Duration>) -> Endpoint {
    match timeout {
        Some(timeout) => endpoint.timeout(timeout),
        None => endpoint,
    }
}

impl GrpcRuntime {
    /// Build a handle without waiting for the runtime to become healthy.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidEndpoint`] when `config.target` cannot be used.
    pub fn connect_lazy(config: &RuntimeConfig) -> Result<RuntimeHandle, Error> {
        let target = Target::parse(&config.target)?;
        let runtime = Arc::new(Self::new(channel(&target, config.request_timeout)?));

        Ok(RuntimeHandle::builder()
            .authentication(runtime.clone())
            .authorization(runtime.clone())
            .identity(runtime.clone())
            .health(runtime)
            .health_poll_interval(config.health_poll_interval)
            .build())
    }

    /// Build a handle and, unless `config.wait_timeout` is zero, wait for the
    /// runtime to become healthy.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidEndpoint`] for unusable targets. When waiting,
    /// [`ErrorKind::DeadlineExceeded`] or [`ErrorKind::Cancelled`] composed
    /// with the last [`ErrorKind::NotReady`] error.
    #[tracing::instrument(skip_all, fields(target = %config.target))]
    pub async fn connect(
        config: &RuntimeConfig,
        cancel: &CancellationToken,
    ) -> Result<RuntimeHandle, Error> {
        let handle = Self::connect_lazy(config)?;

        if config.waits_for_readiness() {
            tracing::debug!(timeout = ?config.wait_timeout, "waiting for IAM runtime");
            handle
                .wait_healthy_with_timeout(config.wait_timeout, cancel)
                .await?;
        }

        tracing::info!("connected to IAM runtime");
        Ok(handle)
    }

    /// [`GrpcRuntime::connect`] with [`RuntimeConfig::from_env`].
    ///
    /// # Errors
    ///
    /// As [`GrpcRuntime::connect`].
    pub async fn connect_from_env(cancel: &CancellationToken) -> Result<RuntimeHandle, Error> {
        Self::connect(&RuntimeConfig::from_env(), cancel).await
    }
}
