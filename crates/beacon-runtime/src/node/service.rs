use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use beacon_core::config::BeaconConfig;
use beacon_core::error::{BeaconError, Result};
use beacon_core::service::{
    AlwaysPass, HealthCheck, HealthCheckSpec, NodeRole, RegistryClient, Resolver,
    ServiceIdentity, ServiceRegistration,
};

use super::heartbeat::{HeartbeatConfig, HeartbeatLoop};
use super::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownPhase, ShutdownTrigger};
use crate::discovery::{CatalogResolver, DiscoveryClient};
use crate::gateway::{self, Downstream, GatewayState};
use crate::registry::{ConsulClient, RegistrationHandle};

/// Hostname of the local machine.
pub fn local_hostname() -> Result<String> {
    hostname::get()
        .map_err(|e| BeaconError::Construction(format!("Failed to read hostname: {}", e)))?
        .into_string()
        .map_err(|_| BeaconError::Construction("Hostname is not valid UTF-8".to_string()))
}

/// A registered, heartbeating service node.
///
/// Values of this type only exist after the registry has accepted the
/// registration, so nothing can be served before that.
pub struct ServiceNode {
    identity: ServiceIdentity,
    role: NodeRole,
    handle: Arc<RegistrationHandle>,
    heartbeat: Arc<HeartbeatLoop>,
    shutdown: Arc<ShutdownCoordinator>,
    downstream: Option<Downstream>,
}

impl ServiceNode {
    /// Create a new builder for configuring a node.
    pub fn builder() -> ServiceNodeBuilder {
        ServiceNodeBuilder::new()
    }

    /// Identity registered with the registry.
    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Role of this node.
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Live registration.
    pub fn registration(&self) -> Arc<RegistrationHandle> {
        self.handle.clone()
    }

    /// Heartbeat loop.
    pub fn heartbeat(&self) -> Arc<HeartbeatLoop> {
        self.heartbeat.clone()
    }

    /// Shutdown coordinator.
    pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.shutdown.clone()
    }

    /// Build the HTTP router for this node.
    pub fn router(&self) -> Router {
        let hostname = self.identity.hostname();
        let state = match &self.downstream {
            Some(downstream) => GatewayState::with_downstream(hostname, downstream.clone()),
            None => GatewayState::leaf(hostname),
        };
        gateway::router(Arc::new(state))
    }

    /// Socket address to bind to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.identity.port()))
    }

    /// Bind the listener and serve until shutdown.
    pub async fn serve(self) -> Result<()> {
        let addr = self.addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                // Registered but unable to serve: do not leave the entry behind.
                self.shutdown.shutdown(ShutdownTrigger::Exit).await;
                return Err(BeaconError::Construction(format!(
                    "Failed to bind {}: {}",
                    addr, e
                )));
            }
        };
        self.run(listener).await
    }

    /// Serve on `listener` until a signal arrives or the server stops.
    ///
    /// Whichever happens first deregisters the node. Returns an error if the
    /// server itself failed.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        let mut handles = Vec::new();

        // Heartbeat, stopped by the coordinator
        {
            let heartbeat = self.heartbeat.clone();
            handles.push(tokio::spawn(async move {
                heartbeat.run().await;
            }));
        }

        // Signals
        {
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = shutdown.listen_for_signals().await {
                    tracing::error!("Failed to install signal handlers: {}", e);
                }
            }));
        }

        // HTTP server
        let router = self.router();
        let mut phase_rx = self.shutdown.subscribe();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = phase_rx
                        .wait_for(|phase| *phase != ShutdownPhase::Running)
                        .await;
                })
                .await
        });

        tracing::info!(
            service_id = %self.identity.id(),
            role = %self.role,
            "Starting to listen at {}...",
            local_addr
        );

        let served = server.await;

        let result = match served {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!("Server error: {}", e);
                Err(BeaconError::Io(e))
            }
            Err(e) => {
                tracing::error!("Server task failed: {}", e);
                Err(BeaconError::Transport(format!("server task failed: {}", e)))
            }
        };

        if self.shutdown.shutdown(ShutdownTrigger::Exit).await == ShutdownOutcome::AlreadyClaimed {
            tracing::debug!("Deregistration handled by signal path");
        }

        self.heartbeat.stop();
        for handle in handles {
            handle.abort();
        }

        tracing::info!(service_id = %self.identity.id(), "Node stopped");
        result
    }
}

/// Builder for configuring a [`ServiceNode`].
pub struct ServiceNodeBuilder {
    config: BeaconConfig,
    hostname: Option<String>,
    registry: Option<Arc<dyn RegistryClient>>,
    resolver: Option<Arc<dyn Resolver>>,
    health_check: Arc<dyn HealthCheck>,
    http_client: Option<reqwest::Client>,
}

impl ServiceNodeBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: BeaconConfig::default(),
            hostname: None,
            registry: None,
            resolver: None,
            health_check: Arc::new(AlwaysPass),
            http_client: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: BeaconConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the advertised hostname.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Use a specific registry client instead of one built from config.
    pub fn registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a specific resolver for downstream calls.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the health check evaluated on each heartbeat.
    pub fn health_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.health_check = check;
        self
    }

    /// Use a specific HTTP client for downstream calls.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Register with the registry and return the node.
    ///
    /// Every failure here is a construction error; the node never exists
    /// unregistered.
    pub async fn start(self) -> Result<ServiceNode> {
        let config = self.config;

        let hostname = match self.hostname {
            Some(hostname) => hostname,
            None => local_hostname()?,
        };

        let registry: Arc<dyn RegistryClient> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(ConsulClient::new(&config.registry)?),
        };

        let role = config.node.role;
        let identity =
            ServiceIdentity::new(config.node.service_name(), hostname, config.node.port());
        let checks = HealthCheckSpec::for_identity(&identity, config.checks.http_interval());
        let heartbeat_config = HeartbeatConfig::for_spec(&checks, config.checks.check_timeout());
        let registration = ServiceRegistration {
            identity: identity.clone(),
            checks,
        };

        // Nothing fallible may follow a successful registration.
        let downstream = if role.has_downstream() {
            let resolver: Arc<dyn Resolver> = match self.resolver {
                Some(resolver) => resolver,
                None => Arc::new(CatalogResolver::new(registry.clone())),
            };
            Some(build_downstream(
                &config,
                resolver,
                self.http_client,
                identity.hostname(),
            )?)
        } else {
            None
        };

        let handle = RegistrationHandle::register(registry.clone(), &registration)
            .await
            .map_err(|e| {
                BeaconError::Construction(format!("Failed to register with registry: {}", e))
            })?;
        let handle = Arc::new(handle);

        let heartbeat = Arc::new(HeartbeatLoop::new(
            handle.clone(),
            self.health_check,
            heartbeat_config,
        ));
        let shutdown =
            Arc::new(ShutdownCoordinator::new(handle.clone()).with_heartbeat(heartbeat.clone()));

        Ok(ServiceNode {
            identity,
            role,
            handle,
            heartbeat,
            shutdown,
            downstream,
        })
    }
}

fn build_downstream(
    config: &BeaconConfig,
    resolver: Arc<dyn Resolver>,
    http_client: Option<reqwest::Client>,
    hostname: &str,
) -> Result<Downstream> {
    let peer = config.discovery.peer.trim();
    if peer.is_empty() {
        return Err(BeaconError::Construction(
            "discovery.peer must name a service".to_string(),
        ));
    }

    let http = match http_client {
        Some(client) => client,
        None => reqwest::Client::builder()
            .timeout(config.discovery.request_timeout())
            .build()
            .map_err(|e| BeaconError::Construction(format!("Failed to build HTTP client: {}", e)))?,
    };

    Ok(Downstream {
        client: DiscoveryClient::new(resolver, http, hostname),
        peer: peer.to_string(),
    })
}

impl Default for ServiceNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
