use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry key for one running instance.
///
/// Derived from the service name and host identity so that registration and
/// deregistration address the same record for the whole process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Derive the instance ID for `name` running on `hostname`.
    pub fn derive(name: &str, hostname: &str) -> Self {
        Self(format!("{}-{}", name, hostname))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the local service instance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    id: InstanceId,
    hostname: String,
    port: u16,
}

impl ServiceIdentity {
    /// Create the identity for a service listening on `port` of `hostname`.
    pub fn new(name: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        let name = name.into();
        let hostname = hostname.into();
        let id = InstanceId::derive(&name, &hostname);
        Self {
            name,
            id,
            hostname,
            port,
        }
    }

    /// Logical service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry instance ID.
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Host address advertised to the registry.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// ID of the TTL check registered for this instance.
    pub fn ttl_check_id(&self) -> String {
        format!("{}-{}-ttl-check", self.name, self.hostname)
    }

    /// ID of the HTTP-polled check registered for this instance.
    pub fn http_check_id(&self) -> String {
        format!("{}-{}-http-check", self.name, self.hostname)
    }

    /// URL the registry polls for liveness.
    pub fn healthcheck_url(&self) -> String {
        format!("http://{}:{}/healthcheck", self.hostname, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_is_deterministic() {
        let a = InstanceId::derive("web", "host-1");
        let b = InstanceId::derive("web", "host-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "web-host-1");
        assert_ne!(a, InstanceId::derive("backend", "host-1"));
    }

    #[test]
    fn test_identity_derived_ids() {
        let identity = ServiceIdentity::new("backend", "node-a", 8081);
        assert_eq!(identity.id().as_str(), "backend-node-a");
        assert_eq!(identity.ttl_check_id(), "backend-node-a-ttl-check");
        assert_eq!(identity.http_check_id(), "backend-node-a-http-check");
        assert_eq!(identity.healthcheck_url(), "http://node-a:8081/healthcheck");
    }
}
