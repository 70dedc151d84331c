//! Metrics collection and export module

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub requests_total: IntCounter,
    pub requests_success: IntCounter,
    pub requests_failed: IntCounter,
    pub funding_submitted: IntCounter,
    pub funding_failed: IntCounter,
    pub balance_polls: IntCounter,
    pub funding_wait_progress: IntCounter,
    pub dispatches: IntCounterVec,

    // Gauges
    pub requests_in_flight: IntGauge,
    pub funding_queue_depth: IntGauge,

    // Histograms
    pub request_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "stress_requests_total",
            "Total number of stress requests accepted",
        ))?;

        let requests_success = IntCounter::with_opts(Opts::new(
            "stress_requests_success",
            "Number of stress requests that completed successfully",
        ))?;

        let requests_failed = IntCounter::with_opts(Opts::new(
            "stress_requests_failed",
            "Number of stress requests that terminated in failure",
        ))?;

        let funding_submitted = IntCounter::with_opts(Opts::new(
            "funding_submitted_total",
            "Funding transfers submitted from the source account",
        ))?;

        let funding_failed = IntCounter::with_opts(Opts::new(
            "funding_failed_total",
            "Funding jobs that failed to submit or confirm",
        ))?;

        let balance_polls = IntCounter::with_opts(Opts::new(
            "balance_polls_total",
            "Balance reads performed by confirmation pollers",
        ))?;

        let funding_wait_progress = IntCounter::with_opts(Opts::new(
            "funding_wait_progress_total",
            "Periodic progress signals emitted while waiting for funding",
        ))?;

        let dispatches = IntCounterVec::new(
            Opts::new(
                "dispatches_total",
                "Dispatched stress transactions by variant",
            ),
            &["variant"],
        )?;

        let requests_in_flight = IntGauge::with_opts(Opts::new(
            "requests_in_flight",
            "Stress requests currently being processed",
        ))?;

        let funding_queue_depth = IntGauge::with_opts(Opts::new(
            "funding_queue_depth",
            "Funding jobs currently queued or executing",
        ))?;

        let request_latency = Histogram::with_opts(
            HistogramOpts::new(
                "request_latency_seconds",
                "End-to-end stress request latency",
            )
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_success.clone()))?;
        registry.register(Box::new(requests_failed.clone()))?;
        registry.register(Box::new(funding_submitted.clone()))?;
        registry.register(Box::new(funding_failed.clone()))?;
        registry.register(Box::new(balance_polls.clone()))?;
        registry.register(Box::new(funding_wait_progress.clone()))?;
        registry.register(Box::new(dispatches.clone()))?;
        registry.register(Box::new(requests_in_flight.clone()))?;
        registry.register(Box::new(funding_queue_depth.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_success,
            requests_failed,
            funding_submitted,
            funding_failed,
            balance_polls,
            funding_wait_progress,
            dispatches,
            requests_in_flight,
            funding_queue_depth,
            request_latency,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}
