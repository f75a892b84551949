//! solflow - workflow-to-transaction compiler for Solana
//!
//! A workflow is an ordered list of nodes (transfer, swap, liquidity
//! add/remove, generic program call). The library validates the nodes,
//! resolves each into instructions through external services, and compiles
//! everything into one versioned transaction with a managed compute budget.
//! The execution coordinator then signs, sends and confirms it.

pub mod compat;
pub mod config;
pub mod execution;
pub mod metrics;
pub mod observability;
pub mod resolvers;
pub mod services;
pub mod structured_logging;
pub mod tokens;
pub mod tx_builder;
pub mod wallet;
pub mod workflow;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use execution::{ExecutionCoordinator, ExecutionFailure, ExecutionProgress, ExecutionStep};
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
pub use tx_builder::{CompileError, CompiledTransaction, CompilerSettings, WorkflowCompiler};
pub use workflow::{NodeDescriptor, Workflow, WorkflowSnapshot};
