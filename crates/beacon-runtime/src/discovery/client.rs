use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use beacon_core::error::BeaconError;
use beacon_core::service::Resolver;

/// Failure of a downstream call, tagged with the step that failed.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("failed to resolve {service}: {source}")]
    Resolution {
        service: String,
        #[source]
        source: BeaconError,
    },

    #[error("no healthy instances of {service}")]
    NoEndpoints { service: String },

    #[error("request to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CallError {
    /// The step that failed, as shown to HTTP callers.
    pub fn step(&self) -> String {
        match self {
            Self::Resolution { service, .. } | Self::NoEndpoints { service } => {
                format!("resolve {}", service)
            }
            Self::Connect { url, .. } => format!("GET {}", url),
            Self::BodyRead { .. } => "read body".to_string(),
        }
    }

    /// Whether name resolution failed, as opposed to the transport.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::NoEndpoints { .. })
    }
}

/// Peer body plus the hostname of the node that proxied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerResponse {
    pub hostname: String,
    pub downstream_response: String,
}

/// Calls peer services by logical name.
///
/// Owns its resolver and HTTP transport; nothing global is touched. Calls are
/// single-shot with no retry.
#[derive(Clone)]
pub struct DiscoveryClient {
    resolver: Arc<dyn Resolver>,
    http: reqwest::Client,
    hostname: String,
}

impl DiscoveryClient {
    /// Create a new discovery client.
    pub fn new(resolver: Arc<dyn Resolver>, http: reqwest::Client, hostname: impl Into<String>) -> Self {
        Self {
            resolver,
            http,
            hostname: hostname.into(),
        }
    }

    /// Hostname reported alongside peer responses.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Resolve `service` and `GET /` on the first endpoint.
    pub async fn call(&self, service: &str) -> Result<PeerResponse, CallError> {
        let endpoints =
            self.resolver
                .resolve(service)
                .await
                .map_err(|source| CallError::Resolution {
                    service: service.to_string(),
                    source,
                })?;

        let endpoint = endpoints.first().ok_or_else(|| CallError::NoEndpoints {
            service: service.to_string(),
        })?;

        let url = format!("{}/", endpoint.base_url());
        tracing::debug!(service, endpoint = %endpoint.id, %url, "Calling downstream");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| CallError::Connect {
                url: url.clone(),
                source,
            })?;

        let body = response
            .text()
            .await
            .map_err(|source| CallError::BodyRead { url, source })?;

        Ok(PeerResponse {
            hostname: self.hostname.clone(),
            downstream_response: body,
        })
    }
}
