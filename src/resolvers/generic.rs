//! Instruction described directly by a program schema

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;

use super::{Resolution, Resolve, ResolveContext, ResolveError};
use crate::workflow::GenericActionParams;

#[async_trait]
impl Resolve for GenericActionParams {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        // Only the connected wallet can sign for a schema-built instruction
        if let Some(meta) = self
            .accounts
            .iter()
            .find(|meta| meta.is_signer && meta.pubkey != ctx.payer)
        {
            return Err(ResolveError::UnsupportedSigner(meta.pubkey));
        }

        Ok(Resolution::ready([Instruction {
            program_id: self.program_id,
            accounts: self.accounts.clone(),
            data: self.data.clone(),
        }]))
    }
}
