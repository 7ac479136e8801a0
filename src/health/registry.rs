// src/health/registry.rs
use super::entry::{evaluate, CheckEntry, CheckOutcome};
use super::status::{CheckStatus, HealthStatus};
use crate::config::HealthConfig;
use crate::metrics::MetricsCollector;
use crate::probe::{HttpProbe, Probe};
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use url::Url;

/// Tick used until the first full rotation has completed.
const FAST_START_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("health check loop is already running")]
    AlreadyRunning,

    #[error("building HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Registry of named checks plus the loop that keeps their status fresh.
///
/// Every field behind `inner` is only touched with the lock held. Probes are
/// the exception: they are evaluated after the lock is released, so a slow
/// probe never blocks `add_check`, `remove_check` or a status request.
pub struct Health {
    inner: Mutex<Registry>,
    // Held by the one live `run` future; released when that future ends or is dropped.
    loop_active: AtomicBool,
    client: Client,
    metrics: Option<Arc<MetricsCollector>>,
}

struct Registry {
    checks: Vec<CheckEntry>,
    next_index: usize,
    // Cleared by `stop`; the loop exits when it sees this false.
    running: bool,
    healthy: bool,
}

impl Registry {
    fn recompute(&mut self) {
        self.healthy = self
            .checks
            .iter()
            .filter(|c| !c.observe_only)
            .all(|c| c.healthy);
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.checks.iter().position(|c| c.name == name)
    }
}

impl Health {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                checks: Vec::new(),
                next_index: 0,
                running: false,
                healthy: true,
            }),
            loop_active: AtomicBool::new(false),
            client: Client::new(),
            metrics: None,
        }
    }

    /// Builds a registry whose HTTP probes give up after `config.timeout()`.
    pub fn from_config(config: &HealthConfig) -> Result<Self, HealthError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::new().with_http_client(client))
    }

    /// Client handed to probes created by [`Health::http_probe`] from now on.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// A probe that GETs `url` with this registry's HTTP client.
    pub fn http_probe(&self, url: Url) -> Arc<dyn Probe> {
        Arc::new(HttpProbe::new(url, self.client.clone()))
    }

    /// Registers `probe` under `name`.
    ///
    /// Re-adding an existing name swaps the probe and observe-only flag but
    /// keeps the last reported status, so the output does not flicker.
    pub async fn add_check(&self, name: impl Into<String>, observe_only: bool, probe: Arc<dyn Probe>) {
        let name = name.into();
        let mut registry = self.inner.lock().await;

        if let Some(idx) = registry.position(&name) {
            let entry = &mut registry.checks[idx];
            entry.probe = probe;
            entry.observe_only = observe_only;
            debug!(check = %name, observe_only, "replaced health check probe");
            return;
        }

        registry.checks.push(CheckEntry::new(name.clone(), observe_only, probe));
        info!(check = %name, observe_only, total = registry.checks.len(), "added health check");
    }

    /// Drops the check called `name`, if any. Order of the remaining checks
    /// is not preserved.
    pub async fn remove_check(&self, name: &str) {
        let mut registry = self.inner.lock().await;

        let Some(idx) = registry.position(name) else {
            return;
        };
        registry.checks.swap_remove(idx);
        info!(check = %name, total = registry.checks.len(), "removed health check");

        // Under the lock, so an in-flight result for this check cannot
        // re-create its series afterwards.
        if let Some(metrics) = &self.metrics {
            metrics.forget_check(name);
        }
    }

    /// Evaluates the registered checks one per tick until [`Health::stop`].
    ///
    /// A tick lasts `frequency / number_of_checks`, so one full rotation
    /// takes about `frequency` whatever the registry size. The first
    /// rotation runs at a fixed fast tick so status converges right after
    /// startup. Checks added or removed while the loop runs may be skipped or
    /// visited twice in the rotation they happen in.
    pub async fn run(&self, frequency: Duration) -> Result<(), HealthError> {
        if self
            .loop_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HealthError::AlreadyRunning);
        }
        let _active = LoopActive(&self.loop_active);

        let mut count = {
            let mut registry = self.inner.lock().await;
            registry.running = true;
            registry.checks.len().max(1)
        };

        info!(?frequency, checks = count, "starting health check loop");
        let mut first_pass = true;

        loop {
            let pause = if first_pass {
                FAST_START_DELAY
            } else {
                frequency / count as u32
            };
            sleep(pause).await;

            let mut registry = self.inner.lock().await;
            count = registry.checks.len().max(1);
            if !registry.running {
                info!("health check loop stopped");
                return Ok(());
            }

            if registry.next_index >= registry.checks.len() {
                registry.next_index = 0;
                first_pass = false;
            }

            if let Some(entry) = registry.checks.get(registry.next_index) {
                let name = entry.name.clone();
                let probe = entry.probe.clone();
                drop(registry);

                let outcome = evaluate(&name, probe.as_ref()).await;
                let (healthy, elapsed) = (outcome.healthy, outcome.elapsed);

                registry = self.inner.lock().await;
                if store_outcome(&mut registry, &name, outcome) {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_check(&name, healthy, elapsed);
                    }
                }
            }

            registry.next_index += 1;
            registry.recompute();

            if let Some(metrics) = &self.metrics {
                metrics.update_aggregate(registry.healthy, registry.checks.len());
            }
        }
    }

    /// Asks the loop to exit. It notices after its current sleep or probe.
    pub async fn stop(&self) {
        let mut registry = self.inner.lock().await;
        registry.running = false;
        debug!("health check loop asked to stop");
    }

    /// True while a loop is alive and has not been asked to stop.
    pub async fn is_running(&self) -> bool {
        self.loop_active.load(Ordering::Acquire) && self.inner.lock().await.running
    }

    pub async fn is_healthy(&self) -> bool {
        self.inner.lock().await.healthy
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.checks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.checks.is_empty()
    }

    /// Snapshot of the aggregate and every check, without the probes.
    pub async fn status(&self) -> HealthStatus {
        let registry = self.inner.lock().await;
        HealthStatus {
            healthy: registry.healthy,
            checks: registry.checks.iter().map(CheckStatus::from).collect(),
        }
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the loop marker however `run` ends, including when its future is dropped.
struct LoopActive<'a>(&'a AtomicBool);

impl Drop for LoopActive<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Returns false when the check was removed while its probe ran.
fn store_outcome(registry: &mut Registry, name: &str, outcome: CheckOutcome) -> bool {
    let Some(idx) = registry.position(name) else {
        debug!(check = %name, "check removed while its probe ran, dropping result");
        return false;
    };

    let entry = &mut registry.checks[idx];
    let was_healthy = entry.healthy;

    if was_healthy && !outcome.healthy {
        warn!(check = %name, message = %outcome.message, "health check is failing");
    } else if !was_healthy && outcome.healthy {
        info!(check = %name, "health check recovered");
    } else {
        debug!(check = %name, healthy = outcome.healthy, elapsed = ?outcome.elapsed, "health check ran");
    }

    entry.record(outcome);
    true
}
