//! Native SOL transfer

use async_trait::async_trait;
#[allow(deprecated)]
use solana_sdk::system_instruction;

use super::{Resolution, Resolve, ResolveContext, ResolveError};
use crate::workflow::TransferParams;

impl TransferParams {
    /// Single system transfer from the payer; no service calls
    pub fn to_instruction(
        &self,
        payer: &solana_sdk::pubkey::Pubkey,
    ) -> Result<solana_sdk::instruction::Instruction, ResolveError> {
        if self.amount_lamports == 0 {
            return Err(ResolveError::InvalidAmount(
                "transfer amount must be positive".to_string(),
            ));
        }
        if self.destination == solana_sdk::pubkey::Pubkey::default() {
            return Err(ResolveError::InvalidAddress(self.destination.to_string()));
        }
        Ok(system_instruction::transfer(
            payer,
            &self.destination,
            self.amount_lamports,
        ))
    }
}

#[async_trait]
impl Resolve for TransferParams {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        Ok(Resolution::ready([self.to_instruction(&ctx.payer)?]))
    }
}
