//! Workflow compiler
//!
//! Turns a [`WorkflowSnapshot`] into one versioned transaction:
//!
//! 1. resolve every node in order, sequentially, aborting on the first failure
//! 2. fetch all referenced lookup tables concurrently
//! 3. materialize compressed instructions and strip stray budget instructions
//! 4. simulate for a unit limit (best effort)
//! 5. prepend `[limit?, price]`, fetch a blockhash, compile the V0 message
//! 6. check extra signers against the message's required signers
//!
//! The compiler holds no per-call state; concurrent compiles share nothing
//! but the service handles.

use itertools::Itertools;
use solana_sdk::{
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::decompile::materialize;
use super::errors::CompileError;
use super::instructions::{
    plan_workflow_instructions, sanity_check_ix_order, strip_compute_budget,
    unit_limit_with_margin,
};
use super::lookup::resolve_lookup_tables;
use super::output::{CompiledTransaction, NodeSpan};
use super::simulate::estimate_compute_units;
use crate::compat;
use crate::config::Config;
use crate::metrics::{metrics, Timer};
use crate::observability::TraceContext;
use crate::resolvers::{PendingInstruction, Resolve, ResolveContext, ResolverSettings};
use crate::services::{Ledger, LiquidityService, QuoteService};
use crate::structured_logging::StructuredLogger;
use crate::tokens::TokenRegistry;
use crate::workflow::{NodeDescriptor, WorkflowSnapshot};

/// Compiler policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSettings {
    pub resolver: ResolverSettings,
    pub unit_price_micro_lamports: u64,
    /// Headroom added to the simulated estimate
    pub margin_percent: u32,
    /// When false the unit-limit instruction is never attached
    pub simulate: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            resolver: ResolverSettings::default(),
            unit_price_micro_lamports: 100,
            margin_percent: 0,
            simulate: true,
        }
    }
}

impl CompilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resolver: ResolverSettings {
                swap_leading_instructions: config.quote.leading_instructions,
                liquidity_leading_instructions: config.liquidity.leading_instructions,
            },
            unit_price_micro_lamports: config.compute_budget.unit_price_micro_lamports,
            margin_percent: config.compute_budget.margin_percent,
            simulate: config.compute_budget.simulate,
        }
    }
}

/// Resolved output of one node before materialization
struct NodeOutput<'a> {
    node: &'a NodeDescriptor,
    pending: Vec<PendingInstruction>,
}

pub struct WorkflowCompiler {
    ledger: Arc<dyn Ledger>,
    quote: Arc<dyn QuoteService>,
    liquidity: Arc<dyn LiquidityService>,
    tokens: Arc<TokenRegistry>,
    settings: CompilerSettings,
}

impl WorkflowCompiler {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        quote: Arc<dyn QuoteService>,
        liquidity: Arc<dyn LiquidityService>,
        tokens: Arc<TokenRegistry>,
        settings: CompilerSettings,
    ) -> Self {
        Self {
            ledger,
            quote,
            liquidity,
            tokens,
            settings,
        }
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Compile `snapshot` with `payer` as fee payer
    pub async fn compile(
        &self,
        snapshot: &WorkflowSnapshot,
        payer: &Pubkey,
    ) -> Result<CompiledTransaction, CompileError> {
        self.compile_traced(snapshot, payer, &TraceContext::new("compile"))
            .await
    }

    /// Compile under an existing trace (e.g. from an execution)
    pub async fn compile_traced(
        &self,
        snapshot: &WorkflowSnapshot,
        payer: &Pubkey,
        trace: &TraceContext,
    ) -> Result<CompiledTransaction, CompileError> {
        let logger = StructuredLogger::from_trace(trace);
        let started = Instant::now();
        let timer = Timer::with_name("compile_latency_seconds");
        metrics().compiles_total.inc();

        let result = self.compile_inner(snapshot, payer, &logger).await;
        timer.finish();

        let latency_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(compiled) => {
                metrics().compiles_success.inc();
                logger.log_compile_success(
                    compiled.instructions.len(),
                    compiled.required_signers.len(),
                    compiled.unit_limit,
                    latency_ms,
                );
            }
            Err(e) => {
                metrics().record_compile_failure(e.category());
                logger.log_compile_failure(e.category(), &e.to_string(), latency_ms);
            }
        }
        result
    }

    async fn compile_inner(
        &self,
        snapshot: &WorkflowSnapshot,
        payer: &Pubkey,
        logger: &StructuredLogger,
    ) -> Result<CompiledTransaction, CompileError> {
        for warning in snapshot.warnings() {
            logger.log_node_skipped(&warning.node_id, &warning.label, &warning.error.to_string());
        }
        metrics()
            .nodes_skipped
            .inc_by(snapshot.warnings().len() as u64);
        logger.log_compile_started(&snapshot.name, snapshot.len(), snapshot.warnings().len());

        if snapshot.is_empty() {
            return Err(CompileError::EmptyWorkflow);
        }

        // 1. Sequential resolution in node order
        let ctx = ResolveContext {
            payer: *payer,
            quote: self.quote.as_ref(),
            liquidity: self.liquidity.as_ref(),
            tokens: self.tokens.as_ref(),
            settings: self.settings.resolver,
        };
        let mut outputs = Vec::with_capacity(snapshot.len());
        let mut extra_signers: Vec<Arc<Keypair>> = Vec::new();
        let mut table_keys: Vec<Pubkey> = Vec::new();

        for node in snapshot.nodes() {
            let node_started = Instant::now();
            let timer = Timer::with_name("resolve_latency_seconds");
            let resolution = node
                .action
                .resolve(&ctx)
                .await
                .map_err(|e| CompileError::for_node(node, e))?;
            timer.finish();
            metrics().nodes_resolved.inc();

            logger.log_node_resolved(
                &node.id,
                node.order_id,
                node.kind().as_str(),
                resolution.instructions.len(),
                node_started.elapsed().as_millis() as u64,
            );
            extra_signers.extend(resolution.extra_signers);
            table_keys.extend(resolution.lookup_tables);
            outputs.push(NodeOutput {
                node,
                pending: resolution.instructions,
            });
        }

        if outputs.iter().all(|o| o.pending.is_empty()) {
            return Err(CompileError::EmptyWorkflow);
        }

        // 2. Lookup tables
        let tables = resolve_lookup_tables(self.ledger.as_ref(), &table_keys).await?;

        // 3. Materialize per node, keeping track of each node's span
        let mut body = Vec::new();
        let mut spans = Vec::with_capacity(outputs.len());
        for output in &outputs {
            let instructions = materialize(&output.pending, &tables)?;
            let (instructions, stripped) = strip_compute_budget(instructions);
            if stripped > 0 {
                logger.warn(&format!(
                    "removed {} compute-budget instruction(s) from node '{}'",
                    stripped, output.node.id
                ));
                metrics().budget_instructions_stripped.inc_by(stripped as u64);
            }
            let start = body.len();
            body.extend(instructions);
            spans.push((output.node, start..body.len()));
        }
        if body.is_empty() {
            return Err(CompileError::EmptyWorkflow);
        }

        // 4. Compute budget
        let unit_limit = if self.settings.simulate {
            estimate_compute_units(self.ledger.as_ref(), payer, &body, &tables)
                .await
                .map(|units| unit_limit_with_margin(units, self.settings.margin_percent))
        } else {
            None
        };
        if unit_limit.is_none() {
            metrics().budget_fallbacks.inc();
            debug!("Compiling without a unit-limit instruction");
        }

        let plan = plan_workflow_instructions(
            unit_limit,
            self.settings.unit_price_micro_lamports,
            body,
        );
        sanity_check_ix_order(&plan)?;
        let offset = plan.budget_len();

        // 5. Message
        let blockhash = self.ledger.latest_blockhash().await?;
        let message = MessageV0::try_compile(payer, &plan.instructions, &tables, blockhash)
            .map_err(|e| CompileError::MessageCompile(e.to_string()))?;
        let message = VersionedMessage::V0(message);

        // 6. Signers
        let extra_signers = dedup_signers(extra_signers);
        let required_signers = compat::get_required_signers(&message).to_vec();
        check_signers(payer, &required_signers, &extra_signers)?;

        let tx = VersionedTransaction {
            signatures: vec![Signature::default(); required_signers.len()],
            message,
        };

        let node_spans = spans
            .into_iter()
            .map(|(node, range)| NodeSpan {
                node_id: node.id.clone(),
                order_id: node.order_id,
                kind: node.kind(),
                range: range.start + offset..range.end + offset,
            })
            .collect();

        Ok(CompiledTransaction {
            tx,
            payer: *payer,
            blockhash,
            instructions: plan.instructions,
            lookup_tables: tables,
            extra_signers,
            required_signers,
            unit_limit: plan.unit_limit,
            unit_price: plan.unit_price,
            node_spans,
            warnings: snapshot.warnings().to_vec(),
        })
    }
}

fn dedup_signers(signers: Vec<Arc<Keypair>>) -> Vec<Arc<Keypair>> {
    signers.into_iter().unique_by(|k| k.pubkey()).collect()
}

/// Every extra signer must be required, and every required signer other
/// than the payer must have a keypair
fn check_signers(
    payer: &Pubkey,
    required: &[Pubkey],
    extra: &[Arc<Keypair>],
) -> Result<(), CompileError> {
    let required_set: HashSet<&Pubkey> = required.iter().collect();
    let extra_keys: HashSet<Pubkey> = extra.iter().map(|k| k.pubkey()).collect();

    if let Some(unexpected) = extra_keys.iter().find(|k| !required_set.contains(k)) {
        return Err(CompileError::UnexpectedSigner(*unexpected));
    }
    if let Some(missing) = required
        .iter()
        .find(|k| *k != payer && !extra_keys.contains(*k))
    {
        return Err(CompileError::MissingSigner(*missing));
    }
    Ok(())
}
