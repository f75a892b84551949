//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Compilation
    pub compiles_total: IntCounter,
    pub compiles_success: IntCounter,
    pub compile_failures: IntCounterVec,
    pub nodes_resolved: IntCounter,
    pub nodes_skipped: IntCounter,
    pub lookup_tables_fetched: IntCounter,
    pub budget_fallbacks: IntCounter,
    pub budget_instructions_stripped: IntCounter,

    // Execution
    pub executions_total: IntCounter,
    pub executions_confirmed: IntCounter,
    pub step_failures: IntCounterVec,

    // Histograms
    pub compile_latency: Histogram,
    pub resolve_latency: Histogram,
    pub rpc_latency: Histogram,
    pub quote_latency: Histogram,
    pub liquidity_latency: Histogram,
    pub confirm_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let compiles_total = IntCounter::with_opts(Opts::new(
            "workflow_compiles_total",
            "Total number of workflow compilations attempted",
        ))?;

        let compiles_success = IntCounter::with_opts(Opts::new(
            "workflow_compiles_success",
            "Number of workflow compilations that produced a transaction",
        ))?;

        let compile_failures = IntCounterVec::new(
            Opts::new(
                "workflow_compile_failures",
                "Failed workflow compilations by error category",
            ),
            &["category"],
        )?;

        let nodes_resolved = IntCounter::with_opts(Opts::new(
            "workflow_nodes_resolved",
            "Nodes resolved into instructions",
        ))?;

        let nodes_skipped = IntCounter::with_opts(Opts::new(
            "workflow_nodes_skipped",
            "Nodes skipped as incomplete or invalid",
        ))?;

        let lookup_tables_fetched = IntCounter::with_opts(Opts::new(
            "lookup_tables_fetched",
            "Address lookup tables fetched from the ledger",
        ))?;

        let budget_fallbacks = IntCounter::with_opts(Opts::new(
            "compute_budget_fallbacks",
            "Compilations that omitted the unit-limit instruction",
        ))?;

        let budget_instructions_stripped = IntCounter::with_opts(Opts::new(
            "compute_budget_instructions_stripped",
            "Compute-budget instructions removed from node output",
        ))?;

        let executions_total = IntCounter::with_opts(Opts::new(
            "workflow_executions_total",
            "Total number of workflow executions started",
        ))?;

        let executions_confirmed = IntCounter::with_opts(Opts::new(
            "workflow_executions_confirmed",
            "Executions whose transaction was confirmed",
        ))?;

        let step_failures = IntCounterVec::new(
            Opts::new("execution_step_failures", "Execution failures by step"),
            &["step"],
        )?;

        let compile_latency = Histogram::with_opts(
            HistogramOpts::new("compile_latency_seconds", "End-to-end workflow compile latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let resolve_latency = Histogram::with_opts(
            HistogramOpts::new("resolve_latency_seconds", "Per-node resolution latency")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let quote_latency = Histogram::with_opts(
            HistogramOpts::new("quote_latency_seconds", "Quoting service latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        let liquidity_latency = Histogram::with_opts(
            HistogramOpts::new("liquidity_latency_seconds", "Liquidity service latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]),
        )?;

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new("confirm_latency_seconds", "Submission to confirmation latency")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(compiles_total.clone()))?;
        registry.register(Box::new(compiles_success.clone()))?;
        registry.register(Box::new(compile_failures.clone()))?;
        registry.register(Box::new(nodes_resolved.clone()))?;
        registry.register(Box::new(nodes_skipped.clone()))?;
        registry.register(Box::new(lookup_tables_fetched.clone()))?;
        registry.register(Box::new(budget_fallbacks.clone()))?;
        registry.register(Box::new(budget_instructions_stripped.clone()))?;
        registry.register(Box::new(executions_total.clone()))?;
        registry.register(Box::new(executions_confirmed.clone()))?;
        registry.register(Box::new(step_failures.clone()))?;
        registry.register(Box::new(compile_latency.clone()))?;
        registry.register(Box::new(resolve_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(quote_latency.clone()))?;
        registry.register(Box::new(liquidity_latency.clone()))?;
        registry.register(Box::new(confirm_latency.clone()))?;

        Ok(Self {
            registry,
            compiles_total,
            compiles_success,
            compile_failures,
            nodes_resolved,
            nodes_skipped,
            lookup_tables_fetched,
            budget_fallbacks,
            budget_instructions_stripped,
            executions_total,
            executions_confirmed,
            step_failures,
            compile_latency,
            resolve_latency,
            rpc_latency,
            quote_latency,
            liquidity_latency,
            confirm_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_compile_failure(&self, category: &str) {
        self.compile_failures.with_label_values(&[category]).inc();
    }

    pub fn record_step_failure(&self, step: &str) {
        self.step_failures.with_label_values(&[step]).inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
    histogram_name: Option<&'static str>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            histogram_name: None,
        }
    }

    /// Create a timer with a histogram name for automatic recording
    pub fn with_name(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name: Some(histogram_name),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Finish the timer and record to the associated histogram
    pub fn finish(self) {
        let Some(name) = self.histogram_name else {
            return;
        };
        let duration = self.start.elapsed().as_secs_f64();
        let m = metrics();
        match name {
            "compile_latency_seconds" => m.compile_latency.observe(duration),
            "resolve_latency_seconds" => m.resolve_latency.observe(duration),
            "rpc_latency_seconds" => m.rpc_latency.observe(duration),
            "quote_latency_seconds" => m.quote_latency.observe(duration),
            "liquidity_latency_seconds" => m.liquidity_latency.observe(duration),
            "confirm_latency_seconds" => m.confirm_latency.observe(duration),
            _ => tracing::debug!("Unknown histogram name: {}", name),
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
