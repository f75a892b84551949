//! Compiled workflow transaction
//!
//! Holds the unsigned transaction along with everything needed to sign,
//! inspect and report on it: the ordered instructions, the resolved lookup
//! tables, the extra signer keypairs and which node produced which
//! instructions.

use base64::{prelude::BASE64_STANDARD, Engine};
use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use std::ops::Range;
use std::sync::Arc;

use crate::wallet::{sign_in_place, SigningError};
use crate::workflow::{NodeKind, NodeWarning};

/// Instructions contributed by one node, as a range of the final list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpan {
    pub node_id: String,
    pub order_id: u32,
    pub kind: NodeKind,
    pub range: Range<usize>,
}

pub struct CompiledTransaction {
    /// Unsigned transaction; signature slots are zeroed
    pub tx: VersionedTransaction,
    pub payer: Pubkey,
    pub blockhash: Hash,
    /// Final ordered instruction list (budget prefix first)
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    /// Keypairs created by resolvers, deduplicated
    pub extra_signers: Vec<Arc<Keypair>>,
    /// Extracted from the message header via the compat layer
    pub required_signers: Vec<Pubkey>,
    pub unit_limit: Option<u32>,
    pub unit_price: u64,
    pub node_spans: Vec<NodeSpan>,
    /// Nodes skipped during snapshot validation
    pub warnings: Vec<NodeWarning>,
}

impl std::fmt::Debug for CompiledTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTransaction")
            .field("payer", &self.payer)
            .field("blockhash", &self.blockhash)
            .field("instructions", &self.instructions.len())
            .field("lookup_tables", &self.lookup_tables.len())
            .field("extra_signers", &self.extra_signer_pubkeys())
            .field("required_signers", &self.required_signers)
            .field("unit_limit", &self.unit_limit)
            .field("unit_price", &self.unit_price)
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

impl CompiledTransaction {
    pub fn tx_ref(&self) -> &VersionedTransaction {
        &self.tx
    }

    pub fn required_signers(&self) -> &[Pubkey] {
        &self.required_signers
    }

    pub fn extra_signer_pubkeys(&self) -> Vec<Pubkey> {
        self.extra_signers.iter().map(|k| k.pubkey()).collect()
    }

    /// Instructions contributed by `node_id`
    pub fn node_instructions(&self, node_id: &str) -> &[Instruction] {
        self.node_spans
            .iter()
            .find(|span| span.node_id == node_id)
            .map(|span| &self.instructions[span.range.clone()])
            .unwrap_or(&[])
    }

    /// Copy of the transaction with every extra signer's signature applied;
    /// the payer slot stays empty for the wallet
    pub fn partially_signed(&self) -> Result<VersionedTransaction, SigningError> {
        let mut tx = self.tx.clone();
        for signer in &self.extra_signers {
            sign_in_place(&mut tx, signer.as_ref())?;
        }
        Ok(tx)
    }

    /// base64 of the bincode-serialized unsigned transaction
    pub fn to_base64(&self) -> Result<String, bincode::Error> {
        Ok(BASE64_STANDARD.encode(bincode::serialize(&self.tx)?))
    }
}
