// src/metrics/collector.rs
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Per-check metrics
    pub check_runs_total: IntCounterVec,
    pub check_duration_seconds: HistogramVec,
    pub check_status: IntGaugeVec,

    // Registry metrics
    pub aggregate_status: IntGauge,
    pub checks_registered: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let check_runs_total = IntCounterVec::new(
            Opts::new("health_check_runs_total", "Total number of probe evaluations"),
            &["check", "result"],
        )?;
        registry.register(Box::new(check_runs_total.clone()))?;

        let check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_check_duration_seconds",
                "Probe evaluation duration in seconds",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let check_status = IntGaugeVec::new(
            Opts::new(
                "health_check_status",
                "Last observed check status (1=healthy, 0=unhealthy)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_status.clone()))?;

        let aggregate_status = IntGauge::new(
            "health_aggregate_status",
            "Aggregate health over critical checks (1=healthy, 0=unhealthy)",
        )?;
        registry.register(Box::new(aggregate_status.clone()))?;

        let checks_registered =
            IntGauge::new("health_checks_registered", "Number of registered checks")?;
        registry.register(Box::new(checks_registered.clone()))?;

        Ok(Self {
            check_runs_total,
            check_duration_seconds,
            check_status,
            aggregate_status,
            checks_registered,
        })
    }

    pub fn record_check(&self, check: &str, healthy: bool, duration: Duration) {
        let result = if healthy { "success" } else { "failure" };
        self.check_runs_total
            .with_label_values(&[check, result])
            .inc();

        self.check_duration_seconds
            .with_label_values(&[check])
            .observe(duration.as_secs_f64());

        self.check_status
            .with_label_values(&[check])
            .set(if healthy { 1 } else { 0 });
    }

    pub fn forget_check(&self, check: &str) {
        // Series that never got a sample are absent; nothing to remove then.
        let _ = self.check_status.remove_label_values(&[check]);
        let _ = self.check_duration_seconds.remove_label_values(&[check]);
        for result in ["success", "failure"] {
            let _ = self.check_runs_total.remove_label_values(&[check, result]);
        }
    }

    pub fn update_aggregate(&self, healthy: bool, registered: usize) {
        self.aggregate_status.set(if healthy { 1 } else { 0 });
        self.checks_registered.set(registered as i64);
    }
}
