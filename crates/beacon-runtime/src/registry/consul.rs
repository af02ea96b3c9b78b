//! Consul agent HTTP API client.

use serde::{Deserialize, Serialize};

use beacon_core::config::RegistryConfig;
use beacon_core::error::{BeaconError, Result};
use beacon_core::service::{
    format_duration, BoxFuture, CheckStatus, RegistryClient, ServiceEndpoint, ServiceRegistration,
};

/// Registry client talking to a local Consul agent.
#[derive(Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    datacenter: Option<String>,
}

impl ConsulClient {
    /// Create a client from configuration.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                BeaconError::Construction(format!("Failed to build registry client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
            datacenter: config.datacenter.clone(),
        })
    }

    /// Agent base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, self.url(path));

        if let Some(ref token) = self.token {
            request = request.header("X-Consul-Token", token);
        }
        if let Some(ref dc) = self.datacenter {
            request = request.query(&[("dc", dc)]);
        }

        request
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BeaconError::Registry(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BeaconError::Registry(format!(
                "{} failed: HTTP {}: {}",
                what,
                status,
                body.trim()
            )));
        }

        Ok(response)
    }
}

/// Agent service registration payload.
#[derive(Debug, Serialize)]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Address")]
    address: &'a str,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Checks")]
    checks: Vec<AgentServiceCheck<'a>>,
}

#[derive(Debug, Serialize)]
struct AgentServiceCheck<'a> {
    #[serde(rename = "CheckID")]
    check_id: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    ttl: Option<String>,
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    http: Option<&'a str>,
    #[serde(rename = "Interval", skip_serializing_if = "Option::is_none")]
    interval: Option<String>,
    #[serde(rename = "Notes")]
    notes: &'a str,
}

impl<'a> AgentServiceRegistration<'a> {
    fn from_registration(registration: &'a ServiceRegistration) -> Self {
        let identity = &registration.identity;
        let ttl = &registration.checks.ttl;
        let http = &registration.checks.http;

        Self {
            id: identity.id().as_str(),
            name: identity.name(),
            address: identity.hostname(),
            port: identity.port(),
            checks: vec![
                AgentServiceCheck {
                    check_id: &ttl.check_id,
                    name: &ttl.name,
                    ttl: Some(format_duration(ttl.ttl)),
                    http: None,
                    interval: None,
                    notes: &ttl.notes,
                },
                AgentServiceCheck {
                    check_id: &http.check_id,
                    name: &http.name,
                    ttl: None,
                    http: Some(&http.url),
                    interval: Some(format_duration(http.interval)),
                    notes: &http.notes,
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckUpdate<'a> {
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Output")]
    output: &'a str,
}

/// One entry of `/v1/health/service/{name}`.
#[derive(Debug, Deserialize)]
struct HealthServiceEntry {
    #[serde(rename = "Node")]
    node: HealthNode,
    #[serde(rename = "Service")]
    service: HealthService,
}

#[derive(Debug, Deserialize)]
struct HealthNode {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct HealthService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
}

impl From<HealthServiceEntry> for ServiceEndpoint {
    fn from(entry: HealthServiceEntry) -> Self {
        // An empty service address means "same as the node".
        let address = if entry.service.address.is_empty() {
            entry.node.address
        } else {
            entry.service.address
        };

        ServiceEndpoint {
            id: entry.service.id,
            address,
            port: entry.service.port,
        }
    }
}

impl RegistryClient for ConsulClient {
    fn register<'a>(&'a self, registration: &'a ServiceRegistration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = AgentServiceRegistration::from_registration(registration);
            let request = self
                .request(reqwest::Method::PUT, "/agent/service/register")
                .json(&body);
            self.send(request, "Service registration").await?;
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
            let body = CheckUpdate {
                status: status.as_str(),
                output: note,
            };
            let request = self
                .request(
                    reqwest::Method::PUT,
                    &format!("/agent/check/update/{}", check_id),
                )
                .json(&body);
            self.send(request, "Check update").await?;
            Ok(())
        })
    }

    fn deregister<'a>(&'a self, service_id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let request = self.request(
                reqwest::Method::PUT,
                &format!("/agent/service/deregister/{}", service_id),
            );
            self.send(request, "Service deregistration").await?;
            Ok(())
        })
    }

    fn query_catalog<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<ServiceEndpoint>>> {
        Box::pin(async move {
            let request = self
                .request(reqwest::Method::GET, &format!("/health/service/{}", name))
                .query(&[("passing", "true"), ("near", "_agent")]);
            let response = self.send(request, "Catalog query").await?;

            let entries: Vec<HealthServiceEntry> = response.json().await.map_err(|e| {
                BeaconError::Registry(format!("Failed to parse catalog response: {}", e))
            })?;

            Ok(entries.into_iter().map(ServiceEndpoint::from).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::service::{HealthCheckSpec, ServiceIdentity, DEFAULT_HTTP_CHECK_INTERVAL};

    fn registration() -> ServiceRegistration {
        let identity = ServiceIdentity::new("backend", "node-a", 8081);
        let checks = HealthCheckSpec::for_identity(&identity, DEFAULT_HTTP_CHECK_INTERVAL);
        ServiceRegistration { identity, checks }
    }

    #[test]
    fn test_registration_payload() {
        let registration = registration();
        let payload = AgentServiceRegistration::from_registration(&registration);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["ID"], "backend-node-a");
        assert_eq!(json["Name"], "backend");
        assert_eq!(json["Address"], "node-a");
        assert_eq!(json["Port"], 8081);

        let checks = json["Checks"].as_array().unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0]["CheckID"], "backend-node-a-ttl-check");
        assert_eq!(checks[0]["TTL"], "2s");
        assert!(checks[0].get("HTTP").is_none());
        assert_eq!(checks[1]["CheckID"], "backend-node-a-http-check");
        assert_eq!(checks[1]["HTTP"], "http://node-a:8081/healthcheck");
        assert_eq!(checks[1]["Interval"], "10s");
    }

    #[test]
    fn test_check_update_payload() {
        let body = CheckUpdate {
            status: CheckStatus::Critical.as_str(),
            output: "disk full",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["Status"], "critical");
        assert_eq!(json["Output"], "disk full");
    }

    #[test]
    fn test_health_entry_falls_back_to_node_address() {
        let raw = r#"[
            {"Node": {"Address": "10.0.0.5"}, "Service": {"ID": "backend-a", "Address": "", "Port": 8081}},
            {"Node": {"Address": "10.0.0.6"}, "Service": {"ID": "backend-b", "Address": "backend-b.local", "Port": 9000}}
        ]"#;
        let entries: Vec<HealthServiceEntry> = serde_json::from_str(raw).unwrap();
        let endpoints: Vec<ServiceEndpoint> = entries.into_iter().map(Into::into).collect();

        assert_eq!(endpoints[0].address, "10.0.0.5");
        assert_eq!(endpoints[0].port, 8081);
        assert_eq!(endpoints[1].address, "backend-b.local");
        assert_eq!(endpoints[1].id, "backend-b");
    }

    #[test]
    fn test_client_urls() {
        let config = RegistryConfig {
            address: "consul:8500".to_string(),
            token: None,
            datacenter: None,
            timeout_secs: 1,
        };
        let client = ConsulClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://consul:8500");
        assert_eq!(
            client.url("/agent/service/register"),
            "http://consul:8500/v1/agent/service/register"
        );
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_registry_error() {
        let config = RegistryConfig {
            address: "127.0.0.1:1".to_string(),
            token: None,
            datacenter: None,
            timeout_secs: 1,
        };
        let client = ConsulClient::new(&config).unwrap();
        let err = client.deregister("web-host").await.unwrap_err();
        assert!(matches!(err, BeaconError::Registry(_)));
    }
}
