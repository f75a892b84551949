//! Error types for workflow compilation
//!
//! Every variant here is fatal to one compile call. Node validation problems
//! are not errors at this level: they surface as
//! [`NodeWarning`](crate::workflow::NodeWarning)s on the snapshot and the
//! node is skipped.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::resolvers::ResolveError;
use crate::services::ServiceError;
use crate::workflow::{NodeDescriptor, NodeKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// No instruction left after filtering inactive and incomplete nodes
    #[error("workflow produced no instructions")]
    EmptyWorkflow,

    /// A resolver failed; carries the offending node's identity
    #[error("node {order_id} '{label}' ({kind}) failed: {source}")]
    Resolve {
        node_id: String,
        label: String,
        order_id: u32,
        kind: NodeKind,
        #[source]
        source: ResolveError,
    },

    /// A referenced lookup table has no ledger account
    #[error("lookup table {0} unavailable")]
    LookupTableUnavailable(Pubkey),

    /// Lookup table account exists but cannot be decoded
    #[error("lookup table {table} invalid: {reason}")]
    LookupTableInvalid { table: Pubkey, reason: String },

    /// A compressed instruction cannot be expanded against its tables
    #[error("instruction decompile failed: {0}")]
    Decompile(String),

    /// Ledger read failed (lookup tables, blockhash)
    #[error("ledger error: {0}")]
    Ledger(#[from] ServiceError),

    /// The final message could not be compiled
    #[error("message compile failed: {0}")]
    MessageCompile(String),

    /// An extra signer the compiled message does not require
    #[error("extra signer {0} is not required by the transaction")]
    UnexpectedSigner(Pubkey),

    /// A required signer no resolver supplied a keypair for
    #[error("required signer {0} has no keypair")]
    MissingSigner(Pubkey),

    /// Final instruction list violates the budget placement rule
    #[error("invalid instruction order: {0}")]
    InvalidInstructionOrder(String),
}

impl CompileError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyWorkflow => "empty",
            Self::Resolve { .. } => "resolution",
            Self::LookupTableUnavailable(_) | Self::LookupTableInvalid { .. } => "lookup_table",
            Self::Decompile(_) => "decompile",
            Self::Ledger(_) => "ledger",
            Self::MessageCompile(_) => "message",
            Self::UnexpectedSigner(_) | Self::MissingSigner(_) => "signer",
            Self::InvalidInstructionOrder(_) => "validation",
        }
    }

    /// Id of the node that caused the failure, if one did
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Resolve { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Underlying resolver error, if any
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Self::Resolve { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Convenience constructors
impl CompileError {
    /// Wrap a resolver failure with the node that produced it
    pub fn for_node(node: &NodeDescriptor, source: ResolveError) -> Self {
        Self::Resolve {
            node_id: node.id.clone(),
            label: node.label.clone(),
            order_id: node.order_id,
            kind: node.kind(),
            source,
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn decompile(reason: impl Into<String>) -> Self {
        Self::Decompile(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{LiquidityRemoveParams, NodeAction};

    #[test]
    fn test_node_context_in_message() {
        let pool = Pubkey::new_unique();
        let node = NodeDescriptor::new(
            "n3",
            3,
            NodeAction::LiquidityRemove(LiquidityRemoveParams { pool }),
        )
        .unwrap()
        .with_label("Exit pool");

        let err = CompileError::for_node(&node, ResolveError::NoPositionFound(pool));
        assert_eq!(err.category(), "resolution");
        assert_eq!(err.node_id(), Some("n3"));
        assert_eq!(
            err.resolve_error(),
            Some(&ResolveError::NoPositionFound(pool))
        );
        assert_eq!(
            err.to_string(),
            format!(
                "node 3 'Exit pool' (liquidityRemove) failed: no position found in pool {}",
                pool
            )
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(CompileError::EmptyWorkflow.category(), "empty");
        assert_eq!(
            CompileError::LookupTableUnavailable(Pubkey::new_unique()).category(),
            "lookup_table"
        );
        assert_eq!(
            CompileError::UnexpectedSigner(Pubkey::new_unique()).category(),
            "signer"
        );
        assert_eq!(
            CompileError::Ledger(ServiceError::Rpc("down".into())).category(),
            "ledger"
        );
    }
}
