//! Workflow transaction builder
//!
//! Compiles an ordered list of workflow nodes into one Solana versioned
//! transaction. The work is split into focused modules:
//! - **errors**: compile error taxonomy with per-node context
//! - **lookup**: address lookup table fetching and decoding
//! - **decompile**: expanding compressed swap instructions back to full form
//! - **simulate**: compute-unit estimation
//! - **instructions**: budget planning and ordering validation
//! - **output**: the compiled transaction and its signing helpers
//! - **builder**: the [`WorkflowCompiler`] tying it together
//!
//! ## Instruction layout
//!
//! Every compiled transaction begins with its compute budget
//! (`set_compute_unit_limit` when an estimate exists, then
//! `set_compute_unit_price`), followed by each node's instructions in node
//! order. See [`plan_workflow_instructions`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use solana_sdk::pubkey::Pubkey;
//! use solflow::tx_builder::{CompileError, WorkflowCompiler};
//! use solflow::workflow::WorkflowSnapshot;
//!
//! # async fn example(
//! #     compiler: &WorkflowCompiler,
//! #     snapshot: &WorkflowSnapshot,
//! #     payer: Pubkey,
//! # ) -> Result<(), CompileError> {
//! let compiled = compiler.compile(snapshot, &payer).await?;
//! println!("{} instructions", compiled.instructions.len());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod decompile;
pub mod errors;
pub mod instructions;
pub mod lookup;
pub mod output;
pub mod simulate;

pub use builder::{CompilerSettings, WorkflowCompiler};
pub use decompile::{decompile_instruction, materialize};
pub use errors::CompileError;
pub use instructions::{
    is_compute_budget_instruction, plan_workflow_instructions, sanity_check_ix_order,
    strip_compute_budget, unit_limit_with_margin, InstructionPlan,
};
pub use lookup::{decode_lookup_table, resolve_lookup_tables};
pub use output::{CompiledTransaction, NodeSpan};
pub use simulate::{build_simulation_transaction, estimate_compute_units, MAX_COMPUTE_UNIT_LIMIT};
