//! Compute-unit estimation by simulation
//!
//! The workflow's instructions are simulated under the maximum unit limit
//! with a placeholder blockhash and empty signatures; the ledger replaces
//! the blockhash and skips signature verification. Estimation never fails
//! the compile: any problem yields `None` and the unit-limit instruction
//! is left out.

use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::{debug, warn};

use super::errors::CompileError;
use crate::services::Ledger;

/// Maximum compute units a transaction may request
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Unsigned transaction used only for simulation
pub fn build_simulation_transaction(
    payer: &Pubkey,
    instructions: &[Instruction],
    tables: &[AddressLookupTableAccount],
) -> Result<VersionedTransaction, CompileError> {
    let mut sim_instructions = Vec::with_capacity(instructions.len() + 1);
    sim_instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
        MAX_COMPUTE_UNIT_LIMIT,
    ));
    sim_instructions.extend_from_slice(instructions);

    let message = MessageV0::try_compile(payer, &sim_instructions, tables, Hash::default())
        .map_err(|e| CompileError::MessageCompile(e.to_string()))?;
    let num_signatures = message.header.num_required_signatures as usize;

    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); num_signatures],
        message: VersionedMessage::V0(message),
    })
}

/// Simulated compute units for `instructions`, or `None` when no usable
/// estimate could be obtained
pub async fn estimate_compute_units(
    ledger: &dyn Ledger,
    payer: &Pubkey,
    instructions: &[Instruction],
    tables: &[AddressLookupTableAccount],
) -> Option<u64> {
    let tx = match build_simulation_transaction(payer, instructions, tables) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "Could not build simulation transaction");
            return None;
        }
    };

    match ledger.simulate_compute_units(&tx).await {
        Ok(Some(units)) if units > 0 => {
            debug!(units, "Simulated compute units");
            Some(units)
        }
        Ok(_) => {
            warn!("Simulation returned no compute-unit estimate");
            None
        }
        Err(e) => {
            warn!(error = %e, "Simulation failed");
            None
        }
    }
}
