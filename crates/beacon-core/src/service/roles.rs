use serde::{Deserialize, Serialize};

/// Role a node plays in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Front node that calls a downstream peer on `GET /`.
    #[default]
    Web,
    /// Leaf node that answers `GET /` itself.
    Backend,
}

impl NodeRole {
    /// Convert to the string used as the default service name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Backend => "backend",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "web" => Some(Self::Web),
            "backend" => Some(Self::Backend),
            _ => None,
        }
    }

    /// Default listening port for this role.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Web => 8080,
            Self::Backend => 8081,
        }
    }

    /// Whether `GET /` on this role proxies to a downstream peer.
    pub fn has_downstream(&self) -> bool {
        matches!(self, Self::Web)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
