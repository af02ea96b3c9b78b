mod check;
mod identity;
mod roles;
mod traits;

pub use check::{
    format_duration, CheckStatus, HealthCheckSpec, HttpCheck, ServiceRegistration, TtlCheck,
    DEFAULT_HTTP_CHECK_INTERVAL, TTL,
};
pub use identity::{InstanceId, ServiceIdentity};
pub use roles::NodeRole;
pub use traits::{
    check_fn, AlwaysPass, BoxFuture, FnCheck, HealthCheck, HealthVerdict, RegistryClient,
    Resolver, ServiceEndpoint,
};
