pub mod config;
pub mod error;
pub mod service;

pub use config::BeaconConfig;
pub use error::{BeaconError, Result};
pub use service::{
    HealthCheck, HealthCheckSpec, HealthVerdict, NodeRole, RegistryClient, Resolver,
    ServiceEndpoint, ServiceIdentity,
};
