mod logging;
mod registry;

pub use logging::{LogFormat, LoggingConfig};
pub use registry::RegistryConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BeaconError, Result};
use crate::service::NodeRole;

/// Root configuration for a BEACON node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BeaconConfig {
    /// Node identity and role.
    #[serde(default)]
    pub node: NodeConfig,

    /// Registry connection.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Health check tuning.
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Downstream discovery.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BeaconConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BeaconError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| BeaconError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Default configuration for `role`.
    pub fn for_role(role: NodeRole) -> Self {
        Self {
            node: NodeConfig {
                role,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Logical service name. Defaults to the role name.
    pub name: Option<String>,

    /// Role this node plays.
    #[serde(default)]
    pub role: NodeRole,

    /// HTTP port. Defaults to the role's port.
    pub port: Option<u16>,
}

impl NodeConfig {
    /// Service name registered with the registry.
    pub fn service_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.role.as_str().to_string())
    }

    /// Port to listen on.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.role.default_port())
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// How often the registry polls `/healthcheck`, in seconds.
    #[serde(default = "default_http_interval")]
    pub http_interval_secs: u64,

    /// Upper bound on one health predicate evaluation, in milliseconds.
    #[serde(default = "default_check_timeout")]
    pub check_timeout_ms: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            http_interval_secs: default_http_interval(),
            check_timeout_ms: default_check_timeout(),
        }
    }
}

impl ChecksConfig {
    pub fn http_interval(&self) -> Duration {
        Duration::from_secs(self.http_interval_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

fn default_http_interval() -> u64 {
    10
}

fn default_check_timeout() -> u64 {
    500 // half the heartbeat interval
}

/// Downstream discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Peer service called by `GET /` on a web node.
    #[serde(default = "default_peer")]
    pub peer: String,

    /// Downstream request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            peer: default_peer(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl DiscoveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_peer() -> String {
    "backend".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
