use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::heartbeat::HeartbeatLoop;
use crate::registry::RegistrationHandle;

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT or SIGTERM.
    Signal,
    /// The serving loop returned, failed or panicked.
    Exit,
}

impl ShutdownTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Exit => "exit",
        }
    }
}

/// Shutdown progress observed by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Serving normally.
    Running,
    /// Token claimed, deregistration in flight.
    Draining,
    /// Deregistration attempted.
    Complete,
}

/// Result of a call to [`ShutdownCoordinator::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This caller claimed the token and the registry accepted the removal.
    Deregistered,
    /// This caller claimed the token but the registry call failed.
    DeregisterFailed(String),
    /// Another trigger had already claimed the token.
    AlreadyClaimed,
}

/// Runs deregistration exactly once, whichever trigger fires first.
pub struct ShutdownCoordinator {
    handle: Arc<RegistrationHandle>,
    heartbeat: Option<Arc<HeartbeatLoop>>,
    claimed: AtomicBool,
    phase_tx: watch::Sender<ShutdownPhase>,
}

impl ShutdownCoordinator {
    /// Create a coordinator for `handle`.
    pub fn new(handle: Arc<RegistrationHandle>) -> Self {
        let (phase_tx, _) = watch::channel(ShutdownPhase::Running);
        Self {
            handle,
            heartbeat: None,
            claimed: AtomicBool::new(false),
            phase_tx,
        }
    }

    /// Stop `heartbeat` before deregistering.
    pub fn with_heartbeat(mut self, heartbeat: Arc<HeartbeatLoop>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Current phase.
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase_tx.subscribe()
    }

    /// Resolve once shutdown has started.
    pub async fn requested(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|phase| *phase != ShutdownPhase::Running).await;
    }

    /// Deregister if no other trigger has done so.
    ///
    /// The winner notifies subscribers, stops the heartbeat and waits for any
    /// in-flight report to land before calling the registry. A loser waits for
    /// the winner to finish and returns [`ShutdownOutcome::AlreadyClaimed`].
    pub async fn shutdown(&self, trigger: ShutdownTrigger) -> ShutdownOutcome {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(trigger = trigger.as_str(), "Shutdown already in progress");
            let mut rx = self.subscribe();
            let _ = rx
                .wait_for(|phase| *phase == ShutdownPhase::Complete)
                .await;
            return ShutdownOutcome::AlreadyClaimed;
        }

        tracing::info!(trigger = trigger.as_str(), "Starting graceful shutdown");
        self.phase_tx.send_replace(ShutdownPhase::Draining);

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
            heartbeat.stopped().await;
        }

        let outcome = match self.handle.deregister().await {
            Ok(()) => {
                tracing::info!(service_id = %self.handle.service_id(), "Deregistered from registry");
                ShutdownOutcome::Deregistered
            }
            Err(e) => {
                tracing::error!(
                    severity = "fatal",
                    service_id = %self.handle.service_id(),
                    "Failed to deregister from registry: {}",
                    e
                );
                ShutdownOutcome::DeregisterFailed(e.to_string())
            }
        };

        self.phase_tx.send_replace(ShutdownPhase::Complete);
        outcome
    }

    /// Wait for SIGINT or SIGTERM, then shut down.
    pub async fn listen_for_signals(self: Arc<Self>) -> std::io::Result<ShutdownOutcome> {
        wait_for_signal().await?;
        Ok(self.shutdown(ShutdownTrigger::Signal).await)
    }
}

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = interrupt.recv() => {
                tracing::info!("Received SIGINT");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}
