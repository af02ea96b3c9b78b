mod client;
mod resolver;

pub use client::{CallError, DiscoveryClient, PeerResponse};
pub use resolver::CatalogResolver;
