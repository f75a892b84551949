//! Execution coordinator
//!
//! Drives a compiled workflow through `Created → Signed → Sent → Confirmed`.
//! Each transition is published as an [`ExecutionUpdate`]. A failing step is
//! marked failed and nothing after it runs; there is no retry, since a new
//! attempt needs a fresh blockhash and fresh quotes anyway.

use solana_sdk::signature::Signature;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics::{metrics, Timer};
use crate::observability::TraceContext;
use crate::services::{Confirmation, ServiceError};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{CompileError, CompiledTransaction, WorkflowCompiler};
use crate::wallet::{missing_signatures, SigningError, WalletSigner};
use crate::workflow::WorkflowSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExecutionStep {
    Created,
    Signed,
    Sent,
    Confirmed,
}

impl ExecutionStep {
    pub const ALL: [ExecutionStep; 4] = [
        ExecutionStep::Created,
        ExecutionStep::Signed,
        ExecutionStep::Sent,
        ExecutionStep::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStep::Created => "created",
            ExecutionStep::Signed => "signed",
            ExecutionStep::Sent => "sent",
            ExecutionStep::Confirmed => "confirmed",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Active,
    Done,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Done => "done",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Status of all four steps plus the signature once known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionProgress {
    statuses: [StepStatus; 4],
    signature: Option<Signature>,
}

impl Default for ExecutionProgress {
    fn default() -> Self {
        Self {
            statuses: [StepStatus::Pending; 4],
            signature: None,
        }
    }
}

impl ExecutionProgress {
    pub fn status(&self, step: ExecutionStep) -> StepStatus {
        self.statuses[step.index()]
    }

    pub fn steps(&self) -> impl Iterator<Item = (ExecutionStep, StepStatus)> + '_ {
        ExecutionStep::ALL.into_iter().map(|s| (s, self.status(s)))
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn failed_step(&self) -> Option<ExecutionStep> {
        self.steps()
            .find(|(_, status)| *status == StepStatus::Failed)
            .map(|(step, _)| step)
    }

    pub fn is_complete(&self) -> bool {
        self.statuses.iter().all(|s| *s == StepStatus::Done)
    }

    fn set(&mut self, step: ExecutionStep, status: StepStatus) {
        self.statuses[step.index()] = status;
    }
}

/// One status transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUpdate {
    pub correlation_id: String,
    pub step: ExecutionStep,
    pub status: StepStatus,
    pub signature: Option<Signature>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Ledger(#[from] ServiceError),

    #[error("transaction rejected: {0}")]
    Rejected(String),
}

/// A halted execution
#[derive(Error, Debug, Clone)]
#[error("{step} step failed: {error}")]
pub struct ExecutionFailure {
    pub step: ExecutionStep,
    #[source]
    pub error: ExecutionError,
    pub progress: ExecutionProgress,
}

impl ExecutionFailure {
    /// Signature of the submitted transaction, if submission got that far
    pub fn signature(&self) -> Option<&Signature> {
        self.progress.signature()
    }
}

/// A confirmed execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub signature: Signature,
    pub progress: ExecutionProgress,
    pub correlation_id: String,
}

/// Tracks one execution's progress and publishes every change
struct Run<'a> {
    progress: ExecutionProgress,
    logger: StructuredLogger,
    updates: Option<&'a mpsc::Sender<ExecutionUpdate>>,
}

impl Run<'_> {
    fn mark(&mut self, step: ExecutionStep, status: StepStatus) {
        self.progress.set(step, status);
        let signature = self.progress.signature;
        self.logger.log_step(
            step.as_str(),
            status.as_str(),
            signature.map(|s| s.to_string()).as_deref(),
        );
        if let Some(tx) = self.updates {
            let update = ExecutionUpdate {
                correlation_id: self.logger.context_id().to_string(),
                step,
                status,
                signature,
            };
            // Publishing never waits on the receiver
            match tx.try_send(update) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(update)) => debug!(
                    step = %update.step,
                    status = %update.status,
                    "Update channel full, dropping step update"
                ),
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn fail(mut self, step: ExecutionStep, error: impl Into<ExecutionError>) -> ExecutionFailure {
        let error = error.into();
        self.logger.error(&format!("{} step failed: {}", step, error));
        metrics().record_step_failure(step.as_str());
        self.mark(step, StepStatus::Failed);
        ExecutionFailure {
            step,
            error,
            progress: self.progress,
        }
    }
}

pub struct ExecutionCoordinator {
    compiler: Arc<WorkflowCompiler>,
    wallet: Arc<dyn WalletSigner>,
    updates: Option<mpsc::Sender<ExecutionUpdate>>,
}

impl ExecutionCoordinator {
    pub fn new(compiler: Arc<WorkflowCompiler>, wallet: Arc<dyn WalletSigner>) -> Self {
        Self {
            compiler,
            wallet,
            updates: None,
        }
    }

    /// Publish step transitions on `sender`
    ///
    /// Updates are offered without waiting; when the channel is full the
    /// update is dropped and execution carries on.
    pub fn with_updates(mut self, sender: mpsc::Sender<ExecutionUpdate>) -> Self {
        self.updates = Some(sender);
        self
    }

    /// Compile `snapshot` for the connected wallet, then sign, send and confirm
    pub async fn execute(
        &self,
        snapshot: &WorkflowSnapshot,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let trace = TraceContext::new("execute");
        let mut run = self.start(&trace);

        run.mark(ExecutionStep::Created, StepStatus::Active);
        let compiled = match self
            .compiler
            .compile_traced(snapshot, &self.wallet.pubkey(), &trace.child_span("compile"))
            .await
        {
            Ok(compiled) => compiled,
            Err(e) => return Err(run.fail(ExecutionStep::Created, e)),
        };
        run.mark(ExecutionStep::Created, StepStatus::Done);

        self.submit(run, &compiled).await
    }

    /// Sign, send and confirm an already compiled transaction
    pub async fn execute_compiled(
        &self,
        compiled: &CompiledTransaction,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let trace = TraceContext::new("execute");
        let mut run = self.start(&trace);
        run.mark(ExecutionStep::Created, StepStatus::Done);
        self.submit(run, compiled).await
    }

    fn start(&self, trace: &TraceContext) -> Run<'_> {
        metrics().executions_total.inc();
        Run {
            progress: ExecutionProgress::default(),
            logger: StructuredLogger::from_trace(trace),
            updates: self.updates.as_ref(),
        }
    }

    async fn submit(
        &self,
        mut run: Run<'_>,
        compiled: &CompiledTransaction,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let ledger = self.compiler.ledger();

        // Signed: extra signers first, then the wallet
        run.mark(ExecutionStep::Signed, StepStatus::Active);
        let tx = match self.sign(compiled).await {
            Ok(tx) => tx,
            Err(e) => return Err(run.fail(ExecutionStep::Signed, e)),
        };
        run.mark(ExecutionStep::Signed, StepStatus::Done);

        // Sent
        run.mark(ExecutionStep::Sent, StepStatus::Active);
        let signature = match ledger.send_transaction(&tx).await {
            Ok(signature) => signature,
            Err(e) => return Err(run.fail(ExecutionStep::Sent, e)),
        };
        run.progress.signature = Some(signature);
        run.mark(ExecutionStep::Sent, StepStatus::Done);

        // Confirmed
        run.mark(ExecutionStep::Confirmed, StepStatus::Active);
        let timer = Timer::with_name("confirm_latency_seconds");
        let confirmation = ledger.confirm_transaction(&signature).await;
        timer.finish();
        match confirmation {
            Ok(Confirmation::Confirmed) => {}
            Ok(Confirmation::Failed(reason)) => {
                return Err(run.fail(ExecutionStep::Confirmed, ExecutionError::Rejected(reason)))
            }
            Err(e) => return Err(run.fail(ExecutionStep::Confirmed, e)),
        }
        run.mark(ExecutionStep::Confirmed, StepStatus::Done);
        metrics().executions_confirmed.inc();

        Ok(ExecutionReport {
            signature,
            progress: run.progress,
            correlation_id: run.logger.context_id().to_string(),
        })
    }

    async fn sign(
        &self,
        compiled: &CompiledTransaction,
    ) -> Result<solana_sdk::transaction::VersionedTransaction, SigningError> {
        if !self.wallet.is_connected() {
            return Err(SigningError::Disconnected);
        }
        let mut tx = compiled.partially_signed()?;
        self.wallet.sign_transaction(&mut tx).await?;

        let missing = missing_signatures(&tx);
        if !missing.is_empty() {
            return Err(SigningError::MissingSignatures(missing));
        }
        Ok(tx)
    }
}
