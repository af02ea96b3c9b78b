//! Node lifecycle: heartbeat, coordinated shutdown and the serving loop.

mod heartbeat;
mod service;
mod shutdown;

pub use heartbeat::{HeartbeatConfig, HeartbeatLoop, HeartbeatState};
pub use service::{local_hostname, ServiceNode, ServiceNodeBuilder};
pub use shutdown::{
    wait_for_signal, ShutdownCoordinator, ShutdownOutcome, ShutdownPhase, ShutdownTrigger,
};
