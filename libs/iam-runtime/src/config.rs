use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::runtime::DEFAULT_HEALTH_POLL_INTERVAL;

/// Default runtime address.
pub const DEFAULT_TARGET: &str = "unix:///tmp/runtime.sock";

/// Default time to wait for the runtime to become healthy when connecting.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of the environment variables read by [`RuntimeConfig::from_env`].
pub const ENV_PREFIX: &str = "IAMRUNTIME_";

/// Name of the wait timeout variable used by other IAM runtime clients. It
/// takes precedence over `IAMRUNTIME_WAIT_TIMEOUT`.
pub const WAIT_TIMEOUT_ALIAS: &str = "IAMRUNTIME_NEW_CLIENT_WAIT_TIMEOUT";

/// Connection settings for the IAM runtime.
///
/// Durations use humantime strings (`"10s"`, `"250ms"`). A negative or zero
/// `wait_timeout` disables the initial readiness wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// `unix:///path`, an absolute socket path, `host:port` or an
    /// `http(s)://` URI.
    pub target: String,

    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub health_poll_interval: Duration,

    /// Per-request timeout applied to the channel. `None` means no timeout.
    #[serde(
        with = "humantime_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_owned(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            health_poll_interval: DEFAULT_HEALTH_POLL_INTERVAL,
            request_timeout: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `IAMRUNTIME_*` environment variables.
    ///
    /// Recognised variables are `IAMRUNTIME_TARGET`,
    /// `IAMRUNTIME_WAIT_TIMEOUT` (alias `IAMRUNTIME_NEW_CLIENT_WAIT_TIMEOUT`),
    /// `IAMRUNTIME_HEALTH_POLL_INTERVAL` and `IAMRUNTIME_REQUEST_TIMEOUT`. If
    /// any of them cannot be parsed the defaults are used and a warning is
    /// logged.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_figment(&Self::figment()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid IAM runtime environment configuration, using defaults");
            Self::default()
        })
    }

    /// Defaults layered under the `IAMRUNTIME_*` environment variables.
    #[must_use]
    pub fn figment() -> Figment {
        let env = Env::prefixed(ENV_PREFIX).only(&[
            "target",
            "wait_timeout",
            "health_poll_interval",
            "request_timeout",
        ]);
        let wait_alias = Env::raw()
            .only(&[WAIT_TIMEOUT_ALIAS])
            .map(|_| "wait_timeout".into());

        Figment::from(Serialized::defaults(Self::default()))
            .merge(env)
            .merge(wait_alias)
    }

    /// Extract a config from any figment, e.g. one with a YAML layer.
    ///
    /// # Errors
    ///
    /// Any extraction error, including unknown fields.
    #[allow(clippy::result_large_err)]
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// Whether connecting should wait for the runtime to become healthy.
    #[must_use]
    pub fn waits_for_readiness(&self) -> bool {
        !self.wait_timeout.is_zero()
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => parse(&text).map_err(D::Error::custom),
            // A bare number only makes sense without a unit when it is zero.
            Raw::Number(n) if n <= 0 => Ok(Duration::ZERO),
            Raw::Number(n) => Err(D::Error::custom(format!(
                "duration {n} has no unit, expected e.g. \"{n}s\""
            ))),
        }
    }

    /// Negative durations clamp to zero.
    fn parse(text: &str) -> Result<Duration, humantime::DurationError> {
        let text = text.trim();
        match text.strip_prefix('-') {
            Some(negative) => humantime::parse_duration(negative).map(|_| Duration::ZERO),
            None => humantime::parse_duration(text),
        }
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserializer, Serializer};

        #[allow(clippy::ref_option)] // signature required by `serde(with)`
        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Zero means no timeout.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            super::deserialize(deserializer).map(|d| (!d.is_zero()).then_some(d))
        }
    }
}
