use std::sync::Arc;

use beacon_core::error::Result;
use beacon_core::service::{CheckStatus, InstanceId, RegistryClient, ServiceRegistration};

/// A live registration of the local node.
///
/// Only obtainable through [`RegistrationHandle::register`], so holding one
/// proves the registry has accepted the node.
pub struct RegistrationHandle {
    client: Arc<dyn RegistryClient>,
    service_id: InstanceId,
    ttl_check_id: String,
}

impl RegistrationHandle {
    /// Register identity and checks in one call.
    pub async fn register(
        client: Arc<dyn RegistryClient>,
        registration: &ServiceRegistration,
    ) -> Result<Self> {
        client.register(registration).await?;

        tracing::info!(
            service_id = %registration.identity.id(),
            ttl_check_id = %registration.checks.ttl.check_id,
            "Registered service"
        );

        Ok(Self {
            client,
            service_id: registration.identity.id().clone(),
            ttl_check_id: registration.checks.ttl.check_id.clone(),
        })
    }

    /// Registered instance ID.
    pub fn service_id(&self) -> &InstanceId {
        &self.service_id
    }

    /// ID of the TTL check this handle reports against.
    pub fn ttl_check_id(&self) -> &str {
        &self.ttl_check_id
    }

    /// Mark the TTL check as passing.
    pub async fn report_pass(&self, note: Option<&str>) -> Result<()> {
        self.client
            .update_check(&self.ttl_check_id, CheckStatus::Passing, note.unwrap_or(""))
            .await
    }

    /// Mark the TTL check as failing with `reason`.
    pub async fn report_fail(&self, reason: &str) -> Result<()> {
        self.client
            .update_check(&self.ttl_check_id, CheckStatus::Critical, reason)
            .await
    }

    /// Remove the registration.
    pub async fn deregister(&self) -> Result<()> {
        tracing::info!("Deregistering service ID {}...", self.service_id);
        self.client.deregister(self.service_id.as_str()).await
    }
}

impl std::fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("service_id", &self.service_id)
            .field("ttl_check_id", &self.ttl_check_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockRegistry, RegistryCall};
    use beacon_core::service::{HealthCheckSpec, ServiceIdentity, DEFAULT_HTTP_CHECK_INTERVAL};
    use beacon_core::BeaconError;

    fn registration() -> ServiceRegistration {
        let identity = ServiceIdentity::new("web", "host-1", 8080);
        let checks = HealthCheckSpec::for_identity(&identity, DEFAULT_HTTP_CHECK_INTERVAL);
        ServiceRegistration { identity, checks }
    }

    #[tokio::test]
    async fn test_register_records_single_call() {
        let registry = Arc::new(MockRegistry::new());
        let handle = RegistrationHandle::register(registry.clone(), &registration())
            .await
            .unwrap();

        assert_eq!(handle.service_id().as_str(), "web-host-1");
        assert_eq!(handle.ttl_check_id(), "web-host-1-ttl-check");
        assert_eq!(registry.registrations().len(), 1);
    }

    #[tokio::test]
    async fn test_reports_address_ttl_check() {
        let registry = Arc::new(MockRegistry::new());
        let handle = RegistrationHandle::register(registry.clone(), &registration())
            .await
            .unwrap();

        handle.report_pass(None).await.unwrap();
        handle.report_fail("db down").await.unwrap();

        let updates = registry.check_updates();
        assert_eq!(
            updates,
            vec![
                RegistryCall::UpdateCheck {
                    check_id: "web-host-1-ttl-check".to_string(),
                    status: CheckStatus::Passing,
                    note: String::new(),
                },
                RegistryCall::UpdateCheck {
                    check_id: "web-host-1-ttl-check".to_string(),
                    status: CheckStatus::Critical,
                    note: "db down".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_deregister_uses_registered_id() {
        let registry = Arc::new(MockRegistry::new());
        let handle = RegistrationHandle::register(registry.clone(), &registration())
            .await
            .unwrap();

        handle.deregister().await.unwrap();
        assert_eq!(registry.deregistrations(), vec!["web-host-1".to_string()]);
    }

    #[tokio::test]
    async fn test_register_failure_yields_no_handle() {
        let registry = Arc::new(MockRegistry::new());
        registry.fail_registration(true);

        let result = RegistrationHandle::register(registry.clone(), &registration()).await;
        assert!(matches!(result, Err(BeaconError::Registry(_))));
    }

    #[tokio::test]
    async fn test_deregister_error_is_surfaced() {
        let registry = Arc::new(MockRegistry::new());
        let handle = RegistrationHandle::register(registry.clone(), &registration())
            .await
            .unwrap();
        registry.fail_deregistration(true);

        assert!(handle.deregister().await.is_err());
    }
}
