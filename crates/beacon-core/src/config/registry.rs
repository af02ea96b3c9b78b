use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable holding the agent address.
pub const ADDR_ENV: &str = "CONSUL_HTTP_ADDR";

/// Environment variable holding the ACL token.
pub const TOKEN_ENV: &str = "CONSUL_HTTP_TOKEN";

/// Registry agent connection configuration.
///
/// Unset fields fall back to the same environment variables the Consul
/// command line tools read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Agent address, with or without scheme.
    #[serde(default = "default_address")]
    pub address: String,

    /// ACL token sent as `X-Consul-Token`.
    #[serde(default = "default_token")]
    pub token: Option<String>,

    /// Datacenter to query.
    pub datacenter: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: default_token(),
            datacenter: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl RegistryConfig {
    /// Agent base URL including scheme.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_address() -> String {
    std::env::var(ADDR_ENV).unwrap_or_else(|_| "127.0.0.1:8500".to_string())
}

fn default_token() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty())
}

fn default_timeout() -> u64 {
    5
}
