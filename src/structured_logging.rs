//! Structured logging for compile and execution events

use crate::observability::TraceContext;

/// Structured logger bound to one compile or execution run
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn from_trace(trace: &TraceContext) -> Self {
        Self::new(trace.correlation_id().to_string())
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_compile_started(&self, workflow: &str, nodes: usize, skipped: usize) {
        tracing::info!(
            context_id = %self.context_id,
            workflow = %workflow,
            nodes = %nodes,
            skipped = %skipped,
            "Compiling workflow"
        );
    }

    pub fn log_node_skipped(&self, node_id: &str, label: &str, reason: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            node_id = %node_id,
            label = %label,
            reason = %reason,
            "Node skipped"
        );
    }

    pub fn log_node_resolved(
        &self,
        node_id: &str,
        order_id: u32,
        kind: &str,
        instructions: usize,
        latency_ms: u64,
    ) {
        tracing::debug!(
            context_id = %self.context_id,
            node_id = %node_id,
            order_id = %order_id,
            kind = %kind,
            instructions = %instructions,
            latency_ms = %latency_ms,
            "Node resolved"
        );
    }

    pub fn log_compile_success(
        &self,
        instructions: usize,
        signers: usize,
        unit_limit: Option<u32>,
        latency_ms: u64,
    ) {
        tracing::info!(
            context_id = %self.context_id,
            instructions = %instructions,
            signers = %signers,
            unit_limit = ?unit_limit,
            latency_ms = %latency_ms,
            "Workflow compiled"
        );
    }

    pub fn log_compile_failure(&self, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Workflow compilation failed"
        );
    }

    pub fn log_step(&self, step: &str, status: &str, signature: Option<&str>) {
        tracing::info!(
            context_id = %self.context_id,
            step = %step,
            status = %status,
            signature = ?signature,
            "Execution step"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            message = %message,
            "Warning"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            context_id = %self.context_id,
            message = %message,
            "Error"
        );
    }
}
