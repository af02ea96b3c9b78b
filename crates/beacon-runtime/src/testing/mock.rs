//! In-memory registry and resolver doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use beacon_core::error::{BeaconError, Result};
use beacon_core::service::{
    BoxFuture, CheckStatus, RegistryClient, Resolver, ServiceEndpoint, ServiceRegistration,
};

/// A call recorded by [`MockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Register {
        service_id: String,
    },
    UpdateCheck {
        check_id: String,
        status: CheckStatus,
        note: String,
    },
    Deregister {
        service_id: String,
    },
    QueryCatalog {
        name: String,
    },
}

/// Registry double that records every call in order.
#[derive(Default)]
pub struct MockRegistry {
    calls: Mutex<Vec<RegistryCall>>,
    registrations: Mutex<Vec<ServiceRegistration>>,
    catalog: RwLock<HashMap<String, Vec<ServiceEndpoint>>>,
    fail_registration: AtomicBool,
    fail_updates: AtomicBool,
    fail_deregistration: AtomicBool,
    deregister_delay: Mutex<Option<Duration>>,
    update_delay: Mutex<Option<Duration>>,
}

impl MockRegistry {
    /// Create an empty mock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add catalog entries for `name`.
    pub fn with_endpoints(self, name: &str, endpoints: Vec<ServiceEndpoint>) -> Self {
        self.catalog
            .write()
            .unwrap()
            .insert(name.to_string(), endpoints);
        self
    }

    /// Make `register` fail.
    pub fn fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    /// Make `update_check` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `deregister` fail.
    pub fn fail_deregistration(&self, fail: bool) {
        self.fail_deregistration.store(fail, Ordering::SeqCst);
    }

    /// Delay `deregister` so that racing callers overlap.
    pub fn set_deregister_delay(&self, delay: Duration) {
        *self.deregister_delay.lock().unwrap() = Some(delay);
    }

    /// Delay `update_check` before it is recorded, like a slow agent.
    pub fn set_update_delay(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Registrations received.
    pub fn registrations(&self) -> Vec<ServiceRegistration> {
        self.registrations.lock().unwrap().clone()
    }

    /// Check updates received.
    pub fn check_updates(&self) -> Vec<RegistryCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, RegistryCall::UpdateCheck { .. }))
            .collect()
    }

    /// Service IDs deregistered.
    pub fn deregistrations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RegistryCall::Deregister { service_id } => Some(service_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RegistryCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RegistryClient for MockRegistry {
    fn register<'a>(&'a self, registration: &'a ServiceRegistration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_registration.load(Ordering::SeqCst) {
                return Err(BeaconError::Registry("connection refused".to_string()));
            }
            self.record(RegistryCall::Register {
                service_id: registration.identity.id().to_string(),
            });
            self.registrations
                .lock()
                .unwrap()
                .push(registration.clone());
            Ok(())
        })
    }

    fn update_check<'a>(
        &'a self,
        check_id: &'a str,
        status: CheckStatus,
        note: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let delay = *self.update_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.record(RegistryCall::UpdateCheck {
                check_id: check_id.to_string(),
                status,
                note: note.to_string(),
            });
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(BeaconError::Registry("agent unavailable".to_string()));
            }
            Ok(())
        })
    }

    fn deregister<'a>(&'a self, service_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.record(RegistryCall::Deregister {
                service_id: service_id.to_string(),
            });
            let delay = *self.deregister_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_deregistration.load(Ordering::SeqCst) {
                return Err(BeaconError::Registry("agent unavailable".to_string()));
            }
            Ok(())
        })
    }

    fn query_catalog<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServiceEndpoint>>> {
        Box::pin(async move {
            self.record(RegistryCall::QueryCatalog {
                name: name.to_string(),
            });
            Ok(self
                .catalog
                .read()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_default())
        })
    }
}

/// Resolver with a fixed answer.
pub struct StaticResolver {
    answer: std::result::Result<Vec<ServiceEndpoint>, String>,
}

impl StaticResolver {
    /// Resolve every name to `endpoints`.
    pub fn new(endpoints: Vec<ServiceEndpoint>) -> Self {
        Self {
            answer: Ok(endpoints),
        }
    }

    /// Resolve every name to nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Fail every lookup with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(message.into()),
        }
    }
}

impl Resolver for StaticResolver {
    fn resolve<'a>(&'a self, _service: &'a str) -> BoxFuture<'a, Result<Vec<ServiceEndpoint>>> {
        Box::pin(async move {
            self.answer
                .clone()
                .map_err(BeaconError::Resolution)
        })
    }
}
