//! Token swap through the quoting service
//!
//! Quote, build, then split the returned transaction into its instructions.
//! The service prepends its own compute-budget pair; those leading
//! instructions are dropped because the compiler owns the budget.

use async_trait::async_trait;
use solana_sdk::compute_budget;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{PendingInstruction, Resolution, Resolve, ResolveContext, ResolveError};
use crate::compat;
use crate::services::QuoteRequest;
use crate::workflow::SwapParams;

#[async_trait]
impl Resolve for SwapParams {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        let input_mint = ctx
            .tokens
            .resolve(&self.sell_token)
            .ok_or_else(|| ResolveError::UnknownToken(self.sell_token.clone()))?;
        let output_mint = ctx
            .tokens
            .resolve(&self.buy_token)
            .ok_or_else(|| ResolveError::UnknownToken(self.buy_token.clone()))?;
        if self.amount == 0 {
            return Err(ResolveError::InvalidAmount(
                "swap amount must be positive".to_string(),
            ));
        }

        let request = QuoteRequest {
            input_mint,
            output_mint,
            amount: self.amount,
            slippage_bps: self.slippage_bps,
        };
        let quote = ctx
            .quote
            .quote(&request)
            .await?
            .ok_or(ResolveError::QuoteUnavailable {
                input_mint,
                output_mint,
            })?;
        debug!(
            %input_mint,
            %output_mint,
            out_amount = ?quote.out_amount(),
            "Received swap quote"
        );

        let swap = ctx
            .quote
            .build_swap_transaction(&quote, &ctx.payer)
            .await
            .map_err(|e| ResolveError::SwapBuildFailed(e.to_string()))?
            .ok_or_else(|| {
                ResolveError::SwapBuildFailed("service returned no transaction".to_string())
            })?;
        let tx = swap
            .decode()
            .map_err(|e| ResolveError::SwapBuildFailed(e.to_string()))?;

        let fee_payer = compat::get_static_account_keys(&tx.message).first().copied();
        if fee_payer != Some(ctx.payer) {
            return Err(ResolveError::SwapBuildFailed(format!(
                "transaction fee payer {:?} does not match wallet {}",
                fee_payer, ctx.payer
            )));
        }

        let program_ids = compat::get_instruction_program_ids(&tx.message);
        let leading = ctx.settings.swap_leading_instructions.min(program_ids.len());
        for (index, program_id) in program_ids.iter().take(leading).enumerate() {
            if *program_id != compute_budget::id() {
                warn!(
                    index,
                    %program_id,
                    "Dropping a leading swap instruction that is not a compute-budget instruction"
                );
            }
        }

        let lookup_tables = compat::get_address_table_lookups(&tx.message)
            .iter()
            .map(|lookup| lookup.account_key)
            .collect();
        let message = Arc::new(tx.message);
        let instructions = (leading..program_ids.len())
            .map(|index| PendingInstruction::Compressed {
                message: Arc::clone(&message),
                index,
            })
            .collect::<Vec<_>>();

        if instructions.is_empty() {
            return Err(ResolveError::SwapBuildFailed(
                "transaction has no instructions beyond the service's own".to_string(),
            ));
        }

        Ok(Resolution {
            instructions,
            extra_signers: Vec::new(),
            lookup_tables,
        })
    }
}
