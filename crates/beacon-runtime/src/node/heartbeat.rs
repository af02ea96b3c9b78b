use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use beacon_core::service::{HealthCheck, HealthCheckSpec, HealthVerdict, TTL};

use crate::registry::RegistrationHandle;

/// Heartbeat loop configuration.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between reports.
    pub interval: Duration,
    /// Upper bound on one health check evaluation.
    pub check_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: TTL / 2,
            check_timeout: TTL / 4,
        }
    }
}

impl HeartbeatConfig {
    /// Report at half the registered TTL.
    pub fn for_spec(spec: &HealthCheckSpec, check_timeout: Duration) -> Self {
        let interval = spec.report_interval();
        Self {
            interval,
            check_timeout: check_timeout.min(interval),
        }
    }
}

/// Snapshot of the most recent report.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatState {
    /// Last verdict produced by the health check.
    pub last_verdict: Option<HealthVerdict>,
    /// When the last report was attempted.
    pub last_reported_at: Option<DateTime<Utc>>,
    /// Number of reports attempted.
    pub reports: u64,
    /// Number of reports the registry rejected or never received.
    pub failed_reports: u64,
}

impl HeartbeatState {
    fn record(&mut self, verdict: HealthVerdict, delivered: bool) {
        self.last_verdict = Some(verdict);
        self.last_reported_at = Some(Utc::now());
        self.reports += 1;
        if !delivered {
            self.failed_reports += 1;
        }
    }
}

/// Periodically evaluates the health check and reports it on the TTL check.
pub struct HeartbeatLoop {
    handle: Arc<RegistrationHandle>,
    check: Arc<dyn HealthCheck>,
    config: HeartbeatConfig,
    running_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HeartbeatLoop {
    /// Create a new heartbeat loop.
    pub fn new(
        handle: Arc<RegistrationHandle>,
        check: Arc<dyn HealthCheck>,
        config: HeartbeatConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            handle,
            check,
            config,
            running_tx: watch::channel(false).0,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Check if the loop is running.
    pub fn is_running(&self) -> bool {
        *self.running_tx.borrow()
    }

    /// Get the loop configuration.
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Ask the loop to stop. An in-flight report is allowed to finish.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Resolve once the loop is not running.
    pub async fn stopped(&self) {
        let mut rx = self.running_tx.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Run the heartbeat loop until stopped. Returns the final state.
    pub async fn run(&self) -> HeartbeatState {
        self.running_tx.send_replace(true);
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut state = HeartbeatState::default();

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            check_id = %self.handle.ttl_check_id(),
            interval = ?self.config.interval,
            "Heartbeat loop started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut state).await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(reports = state.reports, "Heartbeat loop shutting down");
        self.running_tx.send_replace(false);
        state
    }

    /// Evaluate the check once and report the verdict.
    pub async fn tick(&self, state: &mut HeartbeatState) {
        let verdict = self.evaluate().await;

        let result = match &verdict {
            HealthVerdict::Pass(note) => self.handle.report_pass(note.as_deref()).await,
            HealthVerdict::Fail(reason) => {
                tracing::warn!(msg = %reason, "Check failed");
                self.handle.report_fail(reason).await
            }
        };

        let delivered = match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to report heartbeat: {}", e);
                false
            }
        };

        state.record(verdict, delivered);
    }

    async fn evaluate(&self) -> HealthVerdict {
        match tokio::time::timeout(self.config.check_timeout, self.check.check()).await {
            Ok(verdict) => verdict,
            Err(_) => HealthVerdict::Fail(format!(
                "health check timed out after {:?}",
                self.config.check_timeout
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use beacon_core::service::{
        check_fn, AlwaysPass, BoxFuture, CheckStatus, ServiceIdentity, ServiceRegistration,
        DEFAULT_HTTP_CHECK_INTERVAL,
    };

    use crate::testing::{MockRegistry, RegistryCall};

    async fn registered(registry: Arc<MockRegistry>) -> Arc<RegistrationHandle> {
        let identity = ServiceIdentity::new("backend", "host-1", 8081);
        let checks = HealthCheckSpec::for_identity(&identity, DEFAULT_HTTP_CHECK_INTERVAL);
        let registration = ServiceRegistration { identity, checks };
        Arc::new(
            RegistrationHandle::register(registry, &registration)
                .await
                .unwrap(),
        )
    }

    struct HangingCheck;

    impl HealthCheck for HangingCheck {
        fn check(&self) -> BoxFuture<'_, HealthVerdict> {
            Box::pin(async {
                std::future::pending::<()>().await;
                HealthVerdict::pass()
            })
        }
    }

    #[test]
    fn test_heartbeat_config_default() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.check_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_check_timeout_capped_at_interval() {
        let identity = ServiceIdentity::new("web", "h", 8080);
        let spec = HealthCheckSpec::for_identity(&identity, DEFAULT_HTTP_CHECK_INTERVAL);
        let config = HeartbeatConfig::for_spec(&spec, Duration::from_secs(30));
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.check_timeout, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_at_half_ttl_cadence() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        let heartbeat = Arc::new(HeartbeatLoop::new(
            handle,
            Arc::new(AlwaysPass),
            HeartbeatConfig::default(),
        ));

        let runner = heartbeat.clone();
        let task = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_secs(5)).await;
        heartbeat.stop();
        let state = task.await.unwrap();

        let updates = registry.check_updates();
        assert!(updates.len() >= 4, "got {} reports", updates.len());
        assert_eq!(state.reports as usize, updates.len());
        for update in updates {
            match update {
                RegistryCall::UpdateCheck { check_id, status, .. } => {
                    assert_eq!(check_id, "backend-host-1-ttl-check");
                    assert_eq!(status, CheckStatus::Passing);
                }
                other => panic!("unexpected call {:?}", other),
            }
        }
        assert!(!heartbeat.is_running());
    }

    #[tokio::test]
    async fn test_report_follows_verdict() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        let counter = AtomicUsize::new(0);
        let toggling = check_fn(move || {
            if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                HealthVerdict::pass()
            } else {
                HealthVerdict::fail("queue depth 9000 exceeds 1000")
            }
        });
        let heartbeat = HeartbeatLoop::new(handle, Arc::new(toggling), HeartbeatConfig::default());

        let mut state = HeartbeatState::default();
        for _ in 0..4 {
            heartbeat.tick(&mut state).await;
        }

        let statuses: Vec<(CheckStatus, String)> = registry
            .check_updates()
            .into_iter()
            .filter_map(|c| match c {
                RegistryCall::UpdateCheck { status, note, .. } => Some((status, note)),
                _ => None,
            })
            .collect();

        let reason = "queue depth 9000 exceeds 1000".to_string();
        assert_eq!(
            statuses,
            vec![
                (CheckStatus::Passing, String::new()),
                (CheckStatus::Critical, reason.clone()),
                (CheckStatus::Passing, String::new()),
                (CheckStatus::Critical, reason.clone()),
            ]
        );
        assert_eq!(state.last_verdict, Some(HealthVerdict::Fail(reason)));
    }

    #[tokio::test]
    async fn test_pass_note_is_forwarded() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        let check = check_fn(|| HealthVerdict::Pass(Some("warm cache".to_string())));
        let heartbeat = HeartbeatLoop::new(handle, Arc::new(check), HeartbeatConfig::default());

        heartbeat.tick(&mut HeartbeatState::default()).await;

        assert_eq!(
            registry.check_updates(),
            vec![RegistryCall::UpdateCheck {
                check_id: "backend-host-1-ttl-check".to_string(),
                status: CheckStatus::Passing,
                note: "warm cache".to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_check_reports_failure() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        let heartbeat =
            HeartbeatLoop::new(handle, Arc::new(HangingCheck), HeartbeatConfig::default());

        let mut state = HeartbeatState::default();
        heartbeat.tick(&mut state).await;

        match registry.check_updates().as_slice() {
            [RegistryCall::UpdateCheck { status, note, .. }] => {
                assert_eq!(*status, CheckStatus::Critical);
                assert!(note.contains("timed out"));
            }
            other => panic!("unexpected calls {:?}", other),
        }
        assert_eq!(state.reports, 1);
    }

    #[tokio::test]
    async fn test_blocking_check_is_bounded_by_timeout() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        let stuck = check_fn(|| {
            std::thread::sleep(Duration::from_secs(1));
            HealthVerdict::pass()
        });
        let config = HeartbeatConfig {
            interval: Duration::from_secs(1),
            check_timeout: Duration::from_millis(50),
        };
        let heartbeat = HeartbeatLoop::new(handle, Arc::new(stuck), config);

        let started = std::time::Instant::now();
        let mut state = HeartbeatState::default();
        heartbeat.tick(&mut state).await;

        assert!(started.elapsed() < Duration::from_millis(800));
        assert!(!state.last_verdict.as_ref().unwrap().is_pass());
        match registry.check_updates().as_slice() {
            [RegistryCall::UpdateCheck { status, note, .. }] => {
                assert_eq!(*status, CheckStatus::Critical);
                assert!(note.contains("timed out"));
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_errors_do_not_stop_loop() {
        let registry = Arc::new(MockRegistry::new());
        let handle = registered(registry.clone()).await;
        registry.fail_updates(true);
        let heartbeat = Arc::new(HeartbeatLoop::new(
            handle,
            Arc::new(AlwaysPass),
            HeartbeatConfig::default(),
        ));

        let runner = heartbeat.clone();
        let task = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        heartbeat.stop();
        let state = task.await.unwrap();

        assert!(state.reports >= 3);
        assert_eq!(state.failed_reports, state.reports);
    }
}
