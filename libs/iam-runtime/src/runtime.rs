//! Runtime handle: one shared reference to the remote IAM runtime, split by
//! capability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{AuthenticationClient, AuthorizationClient, HealthClient, IdentityClient};

/// Default interval between readiness probes.
pub const DEFAULT_HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One remote capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Authentication,
    Authorization,
    Identity,
    Health,
}

impl Capability {
    pub const ALL: [Self; 4] = [
        Self::Authentication,
        Self::Authorization,
        Self::Identity,
        Self::Health,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Authentication => 1,
            Self::Authorization => 1 << 1,
            Self::Identity => 1 << 2,
            Self::Health => 1 << 3,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Identity => "identity",
            Self::Health => "health",
        })
    }
}

/// Set of capabilities supported by a [`RuntimeHandle`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self(0b1111)
    }

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Whether every capability in `other` is also in `self`.
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Shared, immutable reference to a connected IAM runtime.
///
/// Composes one optional client per [`Capability`]. The supported set is
/// fixed when the handle is built and can be inspected with
/// [`RuntimeHandle::capabilities`]. Cloning is cheap (`Arc` inside) and the
/// handle is safe to use from any number of concurrent requests.
///
/// ```ignore
/// let handle = RuntimeHandle::builder()
///     .authentication(authn.clone())
///     .authorization(authz.clone())
///     .build();
///
/// assert!(handle.supports(Capability::Authorization));
/// assert!(!handle.supports(Capability::Identity));
/// ```
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<Inner>,
}

struct Inner {
    authentication: Option<Arc<dyn AuthenticationClient>>,
    authorization: Option<Arc<dyn AuthorizationClient>>,
    identity: Option<Arc<dyn IdentityClient>>,
    health: Option<Arc<dyn HealthClient>>,
    capabilities: Capabilities,
    health_poll_interval: Duration,
}

impl RuntimeHandle {
    #[must_use]
    pub fn builder() -> RuntimeHandleBuilder {
        RuntimeHandleBuilder::default()
    }

    /// Build a handle where one client provides every capability.
    #[must_use]
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: AuthenticationClient + AuthorizationClient + IdentityClient + HealthClient + 'static,
    {
        Self::builder()
            .authentication(client.clone())
            .authorization(client.clone())
            .identity(client.clone())
            .health(client)
            .build()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.inner.capabilities.contains(capability)
    }

    #[must_use]
    pub fn authentication(&self) -> Option<&Arc<dyn AuthenticationClient>> {
        self.inner.authentication.as_ref()
    }

    #[must_use]
    pub fn authorization(&self) -> Option<&Arc<dyn AuthorizationClient>> {
        self.inner.authorization.as_ref()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Arc<dyn IdentityClient>> {
        self.inner.identity.as_ref()
    }

    #[must_use]
    pub fn health(&self) -> Option<&Arc<dyn HealthClient>> {
        self.inner.health.as_ref()
    }

    /// Interval between readiness probes while waiting for the runtime.
    #[must_use]
    pub fn health_poll_interval(&self) -> Duration {
        self.inner.health_poll_interval
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("capabilities", &self.inner.capabilities)
            .field("health_poll_interval", &self.inner.health_poll_interval)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RuntimeHandle`].
pub struct RuntimeHandleBuilder {
    authentication: Option<Arc<dyn AuthenticationClient>>,
    authorization: Option<Arc<dyn AuthorizationClient>>,
    identity: Option<Arc<dyn IdentityClient>>,
    health: Option<Arc<dyn HealthClient>>,
    health_poll_interval: Duration,
}

impl Default for RuntimeHandleBuilder {
    fn default() -> Self {
        Self {
            authentication: None,
            authorization: None,
            identity: None,
            health: None,
            health_poll_interval: DEFAULT_HEALTH_POLL_INTERVAL,
        }
    }
}

impl RuntimeHandleBuilder {
    #[must_use]
    pub fn authentication(mut self, client: Arc<dyn AuthenticationClient>) -> Self {
        self.authentication = Some(client);
        self
    }

    #[must_use]
    pub fn authorization(mut self, client: Arc<dyn AuthorizationClient>) -> Self {
        self.authorization = Some(client);
        self
    }

    #[must_use]
    pub fn identity(mut self, client: Arc<dyn IdentityClient>) -> Self {
        self.identity = Some(client);
        self
    }

    #[must_use]
    pub fn health(mut self, client: Arc<dyn HealthClient>) -> Self {
        self.health = Some(client);
        self
    }

    #[must_use]
    pub fn health_poll_interval(mut self, interval: Duration) -> Self {
        self.health_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn build(self) -> RuntimeHandle {
        let mut capabilities = Capabilities::empty();
        if self.authentication.is_some() {
            capabilities = capabilities.with(Capability::Authentication);
        }
        if self.authorization.is_some() {
            capabilities = capabilities.with(Capability::Authorization);
        }
        if self.identity.is_some() {
            capabilities = capabilities.with(Capability::Identity);
        }
        if self.health.is_some() {
            capabilities = capabilities.with(Capability::Health);
        }

        RuntimeHandle {
            inner: Arc::new(Inner {
                authentication: self.authentication,
                authorization: self.authorization,
                identity: self.identity,
                health: self.health,
                capabilities,
                health_poll_interval: self.health_poll_interval,
            }),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;

    #[test]
    fn builder_records_supplied_capabilities() {
        let mock = Arc::new(MockRuntime::new());
        let handle = RuntimeHandle::builder()
            .authentication(mock.clone())
            .authorization(mock)
            .build();

        assert!(handle.supports(Capability::Authentication));
        assert!(handle.supports(Capability::Authorization));
        assert!(!handle.supports(Capability::Identity));
        assert!(!handle.supports(Capability::Health));
        assert!(handle.identity().is_none());
        assert_eq!(
            handle.capabilities().iter().collect::<Vec<_>>(),
            vec![Capability::Authentication, Capability::Authorization]
        );
    }

    #[test]
    fn from_client_supports_everything() {
        let handle = RuntimeHandle::from_client(Arc::new(MockRuntime::new()));

        assert_eq!(handle.capabilities(), Capabilities::all());
        assert_eq!(handle.health_poll_interval(), DEFAULT_HEALTH_POLL_INTERVAL);
    }

    #[test]
    fn capabilities_set_operations() {
        let set: Capabilities = [Capability::Identity, Capability::Health]
            .into_iter()
            .collect();

        assert!(set.contains(Capability::Health));
        assert!(!set.contains(Capability::Authentication));
        assert!(Capabilities::all().contains_all(set));
        assert!(!set.contains_all(Capabilities::all()));
        assert!(Capabilities::empty().is_empty());
        assert_eq!(format!("{set:?}"), "{Identity, Health}");
    }

    #[test]
    fn debug_lists_capabilities() {
        let handle = RuntimeHandle::builder()
            .health_poll_interval(Duration::from_millis(250))
            .build();
        let dbg = format!("{handle:?}");

        assert!(dbg.contains("RuntimeHandle"));
        assert!(dbg.contains("250ms"));
    }
}
