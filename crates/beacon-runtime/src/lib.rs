//! BEACON Runtime
//!
//! Registry client, heartbeat, coordinated shutdown, peer discovery and the
//! HTTP surface of a BEACON node.

pub mod discovery;
pub mod gateway;
pub mod node;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use discovery::{CallError, CatalogResolver, DiscoveryClient, PeerResponse};
pub use gateway::{router, Downstream, GatewayState};
pub use node::{
    HeartbeatConfig, HeartbeatLoop, HeartbeatState, ShutdownCoordinator, ShutdownOutcome,
    ShutdownPhase, ShutdownTrigger, ServiceNode, ServiceNodeBuilder,
};
pub use registry::{ConsulClient, RegistrationHandle};
