use std::sync::Arc;

use beacon_core::error::BeaconError;
use beacon_core::service::{BoxFuture, RegistryClient, Resolver, ServiceEndpoint};

/// Resolves service names through the registry catalog.
///
/// Only passing instances are returned, nearest to the local agent first.
pub struct CatalogResolver {
    registry: Arc<dyn RegistryClient>,
}

impl CatalogResolver {
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self { registry }
    }
}

impl Resolver for CatalogResolver {
    fn resolve<'a>(
        &'a self,
        service: &'a str,
    ) -> BoxFuture<'a, beacon_core::Result<Vec<ServiceEndpoint>>> {
        Box::pin(async move {
            let endpoints = self
                .registry
                .query_catalog(service)
                .await
                .map_err(|e| BeaconError::Resolution(e.to_string()))?;

            tracing::debug!(service, count = endpoints.len(), "Resolved service");
            Ok(endpoints)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{local_endpoint, MockRegistry, RegistryCall};

    #[tokio::test]
    async fn test_resolves_from_catalog() {
        let registry = Arc::new(
            MockRegistry::new().with_endpoints(
                "backend",
                vec![local_endpoint("backend-a", 8081), local_endpoint("backend-b", 8082)],
            ),
        );
        let resolver = CatalogResolver::new(registry.clone());

        let endpoints = resolver.resolve("backend").await.unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].id, "backend-a");
        assert_eq!(
            registry.calls(),
            vec![RegistryCall::QueryCatalog {
                name: "backend".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_service_is_empty() {
        let resolver = CatalogResolver::new(Arc::new(MockRegistry::new()));
        assert!(resolver.resolve("payments").await.unwrap().is_empty());
    }
}
