//! Prometheus metrics for the download orchestrator.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{CollectorStage, Result, TelemetryError};

/// Prometheus-backed metrics registry shared across components.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    jobs_started_total: IntCounter,
    jobs_active: IntGauge,
    finalize_total: IntCounterVec,
    engine_commands_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs accepted since start-up.
    pub jobs_started_total: u64,
    /// Jobs currently registered.
    pub jobs_active: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let jobs_started_total = IntCounter::with_opts(Opts::new(
            "jobs_started_total",
            "Download jobs accepted by the engine",
        ))
        .map_err(|source| collector("jobs_started_total", source))?;
        let jobs_active =
            IntGauge::with_opts(Opts::new("jobs_active", "Download jobs currently registered"))
                .map_err(|source| collector("jobs_active", source))?;
        let finalize_total = IntCounterVec::new(
            Opts::new("finalize_total", "Finalize attempts by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("finalize_total", source))?;
        let engine_commands_total = IntCounterVec::new(
            Opts::new(
                "engine_commands_total",
                "Transfer engine commands issued by status",
            ),
            &["command", "status"],
        )
        .map_err(|source| collector("engine_commands_total", source))?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )
        .map_err(|source| collector("events_emitted_total", source))?;

        register(&registry, "jobs_started_total", &jobs_started_total)?;
        register(&registry, "jobs_active", &jobs_active)?;
        register(&registry, "finalize_total", &finalize_total)?;
        register(&registry, "engine_commands_total", &engine_commands_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                jobs_started_total,
                jobs_active,
                finalize_total,
                engine_commands_total,
                events_emitted_total,
            }),
        })
    }

    /// Count a job accepted by the engine.
    pub fn inc_job_started(&self) {
        self.inner.jobs_started_total.inc();
    }

    /// Set the registered job gauge.
    pub fn set_jobs_active(&self, count: i64) {
        self.inner.jobs_active.set(count);
    }

    /// Count a finalize attempt with its outcome (`success`, `failure`, `skipped`).
    pub fn inc_finalize(&self, outcome: &str) {
        self.inner
            .finalize_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count an engine command with its status (`ok`, `error`).
    pub fn inc_engine_command(&self, command: &str, status: &str) {
        self.inner
            .engine_commands_total
            .with_label_values(&[command, status])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the headline gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_started_total: self.inner.jobs_started_total.get(),
            jobs_active: self.inner.jobs_active.get(),
        }
    }
}

const fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::Collector {
        name,
        stage: CollectorStage::Build,
        source,
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Collector {
            name,
            stage: CollectorStage::Register,
            source,
        })
}
