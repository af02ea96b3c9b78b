use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::identity::ServiceIdentity;

/// TTL of the heartbeat check. Reports are sent every `TTL / 2`.
pub const TTL: Duration = Duration::from_secs(2);

/// Default interval at which the registry polls `/healthcheck`.
pub const DEFAULT_HTTP_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Status reported against a TTL check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passing,
    Critical,
}

impl CheckStatus {
    /// Convert to the registry wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Critical => "critical",
        }
    }
}

/// A check the registry expects the node to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlCheck {
    pub check_id: String,
    pub name: String,
    pub ttl: Duration,
    pub notes: String,
}

/// A check the registry polls on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCheck {
    pub check_id: String,
    pub name: String,
    pub url: String,
    pub interval: Duration,
    pub notes: String,
}

/// Checks registered alongside a service identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub ttl: TtlCheck,
    pub http: HttpCheck,
}

impl HealthCheckSpec {
    /// Build both checks for `identity`.
    pub fn for_identity(identity: &ServiceIdentity, http_interval: Duration) -> Self {
        Self {
            ttl: TtlCheck {
                check_id: identity.ttl_check_id(),
                name: "TTL check".to_string(),
                ttl: TTL,
                notes: "TTL based heartbeat".to_string(),
            },
            http: HttpCheck {
                check_id: identity.http_check_id(),
                name: "HTTP /healthcheck".to_string(),
                url: identity.healthcheck_url(),
                interval: http_interval,
                notes: "HTTP /healthcheck".to_string(),
            },
        }
    }

    /// Interval at which the TTL check must be reported.
    pub fn report_interval(&self) -> Duration {
        self.ttl.ttl / 2
    }
}

/// Identity and checks, registered together in a single registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    pub identity: ServiceIdentity,
    pub checks: HealthCheckSpec,
}

/// Format a duration the way the registry expects (`"2s"`, `"500ms"`).
pub fn format_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
