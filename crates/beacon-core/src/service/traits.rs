use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::check::{CheckStatus, ServiceRegistration};
use crate::error::Result;

/// Boxed future returned by the capability traits in this module.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A reachable instance of a named service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Instance ID in the registry.
    pub id: String,
    /// Host or IP to connect to.
    pub address: String,
    /// Port to connect to.
    pub port: u16,
}

impl ServiceEndpoint {
    /// Base HTTP URL for this endpoint.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// Client side of a service-discovery registry.
///
/// Any registry that can create, heartbeat and remove a named, addressed,
/// health-checked entry, and list entries by name, satisfies this trait.
pub trait RegistryClient: Send + Sync {
    /// Register a service and its checks in one call.
    fn register<'a>(&'a self, registration: &'a ServiceRegistration) -> BoxFuture<'a, Result<()>>;

    /// Report the status of a TTL check.
    fn update_check<'a>(
        &'a self,
        check_id: &'a str,
        status: CheckStatus,
        note: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Remove a service registration by instance ID.
    fn deregister<'a>(&'a self, service_id: &'a str) -> BoxFuture<'a, Result<()>>;

    /// List healthy instances of a service, nearest first.
    fn query_catalog<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServiceEndpoint>>>;
}

/// Resolves a logical service name to candidate endpoints.
///
/// Ordering of the returned endpoints is the resolver's contract; callers use
/// the first one.
pub trait Resolver: Send + Sync {
    /// Resolve `service` to zero or more endpoints.
    fn resolve<'a>(&'a self, service: &'a str) -> BoxFuture<'a, Result<Vec<ServiceEndpoint>>>;
}

/// Outcome of one health evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthVerdict {
    /// Healthy, with an optional note for the registry.
    Pass(Option<String>),
    /// Unhealthy, with the reason reported to the registry.
    Fail(String),
}

impl HealthVerdict {
    /// Healthy without a note.
    pub fn pass() -> Self {
        Self::Pass(None)
    }

    /// Unhealthy with `reason`.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Check if this verdict is passing.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass(_))
    }
}

/// Liveness predicate evaluated on every heartbeat tick.
pub trait HealthCheck: Send + Sync {
    /// Evaluate local health.
    fn check(&self) -> BoxFuture<'_, HealthVerdict>;
}

/// Health check that always passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

impl HealthCheck for AlwaysPass {
    fn check(&self) -> BoxFuture<'_, HealthVerdict> {
        Box::pin(async { HealthVerdict::pass() })
    }
}

/// Health check backed by a synchronous closure.
///
/// The closure runs on the blocking pool, so a hung predicate neither stalls a
/// runtime worker nor escapes the caller's timeout.
pub struct FnCheck<F>(Arc<F>);

/// Wrap a `() -> HealthVerdict` closure as a [`HealthCheck`].
pub fn check_fn<F>(f: F) -> FnCheck<F>
where
    F: Fn() -> HealthVerdict + Send + Sync + 'static,
{
    FnCheck(Arc::new(f))
}

impl<F> HealthCheck for FnCheck<F>
where
    F: Fn() -> HealthVerdict + Send + Sync + 'static,
{
    fn check(&self) -> BoxFuture<'_, HealthVerdict> {
        let f = self.0.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(verdict) => verdict,
                Err(e) => HealthVerdict::fail(format!("health check panicked: {}", e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_always_pass() {
        let verdict = tokio_test::block_on(AlwaysPass.check());
        assert_eq!(verdict, HealthVerdict::Pass(None));
        assert!(verdict.is_pass());
    }

    #[test]
    fn test_fn_check_reflects_closure() {
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = healthy.clone();
        let check = check_fn(move || {
            if flag.load(Ordering::SeqCst) {
                HealthVerdict::pass()
            } else {
                HealthVerdict::fail("disk full")
            }
        });

        assert!(tokio_test::block_on(check.check()).is_pass());
        healthy.store(false, Ordering::SeqCst);
        assert_eq!(
            tokio_test::block_on(check.check()),
            HealthVerdict::Fail("disk full".to_string())
        );
    }

    #[test]
    fn test_fn_check_panic_is_failure() {
        let check = check_fn(|| -> HealthVerdict { panic!("disk sensor exploded") });
        let verdict = tokio_test::block_on(check.check());
        match verdict {
            HealthVerdict::Fail(reason) => assert!(reason.contains("panicked")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_base_url() {
        let endpoint = ServiceEndpoint {
            id: "backend-a".to_string(),
            address: "10.0.0.7".to_string(),
            port: 8081,
        };
        assert_eq!(endpoint.base_url(), "http://10.0.0.7:8081");
    }
}
