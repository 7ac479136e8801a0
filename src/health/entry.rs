// src/health/entry.rs
use crate::probe::{Probe, ProbeError};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One registered check and the last thing its probe told us.
pub struct CheckEntry {
    pub name: String,
    pub healthy: bool,
    pub message: String,
    pub observe_only: bool,
    /// Milliseconds since the epoch, 0 until the first run.
    pub last_checked: u64,
    pub(crate) probe: Arc<dyn Probe>,
}

impl CheckEntry {
    pub fn new(name: impl Into<String>, observe_only: bool, probe: Arc<dyn Probe>) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            message: String::new(),
            observe_only,
            last_checked: 0,
            probe,
        }
    }

    pub(crate) fn record(&mut self, outcome: CheckOutcome) {
        self.healthy = outcome.healthy;
        self.message = outcome.message;
        self.last_checked = outcome.checked_at;
    }
}

impl std::fmt::Debug for CheckEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckEntry")
            .field("name", &self.name)
            .field("healthy", &self.healthy)
            .field("message", &self.message)
            .field("observe_only", &self.observe_only)
            .field("last_checked", &self.last_checked)
            .finish_non_exhaustive()
    }
}

/// Result of evaluating a probe, detached from the entry it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CheckOutcome {
    pub healthy: bool,
    pub message: String,
    pub checked_at: u64,
    pub elapsed: Duration,
}

/// Evaluates `probe` on behalf of the check called `name`.
///
/// Must be called without the registry lock held.
pub(crate) async fn evaluate(name: &str, probe: &dyn Probe) -> CheckOutcome {
    let start = Instant::now();
    let result = probe.evaluate().await;
    let elapsed = start.elapsed();

    let (healthy, message) = match result {
        Ok(()) => (true, "OK".to_string()),
        Err(err) => (false, failure_message(name, &err)),
    };

    CheckOutcome {
        healthy,
        message,
        checked_at: now_millis(),
        elapsed,
    }
}

/// Runs the entry's probe and stores the result on the entry.
pub async fn run_single(entry: &mut CheckEntry) {
    let probe = entry.probe.clone();
    let outcome = evaluate(&entry.name, probe.as_ref()).await;
    entry.record(outcome);
}

fn failure_message(name: &str, err: &ProbeError) -> String {
    format!("{} ERROR {}", name, err)
}

fn now_millis() -> u64 {
    // Clocks before 1970 are clamped to 1 so a run is never mistaken for "never checked".
    Utc::now().timestamp_millis().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedProbe {
        called: AtomicBool,
        failure: Option<&'static str>,
    }

    impl FixedProbe {
        fn new(failure: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                called: AtomicBool::new(false),
                failure,
            })
        }
    }

    #[async_trait]
    impl Probe for FixedProbe {
        async fn evaluate(&self) -> Result<(), ProbeError> {
            self.called.store(true, Ordering::SeqCst);
            match self.failure {
                Some(text) => Err(ProbeError::msg(text)),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn new_entry_is_optimistic() {
        let entry = CheckEntry::new("db", false, FixedProbe::new(None));
        assert!(entry.healthy);
        assert!(entry.message.is_empty());
        assert_eq!(entry.last_checked, 0);
    }

    #[tokio::test]
    async fn success_marks_entry_ok() {
        let probe = FixedProbe::new(None);
        let mut entry = CheckEntry::new("test", false, probe.clone());

        run_single(&mut entry).await;

        assert!(probe.called.load(Ordering::SeqCst));
        assert!(entry.healthy);
        assert_eq!(entry.message, "OK");
        assert!(entry.last_checked > 0);
    }

    #[tokio::test]
    async fn failure_names_the_check_and_the_error() {
        let mut entry = CheckEntry::new("cache", false, FixedProbe::new(Some("Generic Error")));

        run_single(&mut entry).await;

        assert!(!entry.healthy);
        assert!(entry.message.contains("cache"));
        assert!(entry.message.contains("Generic Error"));
        assert!(entry.last_checked > 0);
    }

    #[tokio::test]
    async fn recovery_overwrites_previous_failure() {
        let mut entry = CheckEntry::new("queue", false, FixedProbe::new(Some("down")));
        run_single(&mut entry).await;
        assert!(!entry.healthy);

        entry.probe = FixedProbe::new(None);
        run_single(&mut entry).await;
        assert!(entry.healthy);
        assert_eq!(entry.message, "OK");
    }
}
