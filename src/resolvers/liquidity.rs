//! Concentrated-liquidity deposit and withdrawal

use async_trait::async_trait;
use solana_sdk::signature::{Keypair, Signer};
use tracing::debug;

use super::{drop_leading, Resolution, Resolve, ResolveContext, ResolveError};
use crate::services::{AddLiquidityRequest, RemoveLiquidityRequest, StrategyAmountRequest};
use crate::workflow::{LiquidityAddParams, LiquidityRemoveParams};

/// Full withdrawal
const REMOVE_ALL_BPS: u16 = 10_000;

/// Symmetric bin range `[active - interval, active + interval]`
pub fn bin_range(active_bin: i32, interval: u32) -> Result<(i32, i32), ResolveError> {
    let overflow = || ResolveError::InvalidRange {
        active_bin,
        interval,
    };
    let interval = i32::try_from(interval).map_err(|_| overflow())?;
    let min = active_bin.checked_sub(interval).ok_or_else(overflow)?;
    let max = active_bin.checked_add(interval).ok_or_else(overflow)?;
    Ok((min, max))
}

#[async_trait]
impl Resolve for LiquidityAddParams {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        if self.input_amount == 0 {
            return Err(ResolveError::InvalidAmount(
                "deposit amount must be positive".to_string(),
            ));
        }

        let pool = ctx.liquidity.pool_state(&self.pool).await?;
        let (min_bin_id, max_bin_id) = bin_range(pool.active_bin.bin_id, self.range_interval)?;

        let y_amount = ctx
            .liquidity
            .fill_y_by_strategy(&StrategyAmountRequest {
                pool: self.pool,
                active_bin_id: pool.active_bin.bin_id,
                min_bin_id,
                max_bin_id,
                x_amount: self.input_amount,
                strategy: self.strategy,
            })
            .await?;

        let position = Keypair::new();
        debug!(
            pool = %self.pool,
            position = %position.pubkey(),
            min_bin_id,
            max_bin_id,
            y_amount,
            strategy = %self.strategy,
            "Opening liquidity position"
        );

        let instructions = ctx
            .liquidity
            .add_liquidity_by_strategy(&AddLiquidityRequest {
                pool: self.pool,
                position: position.pubkey(),
                owner: ctx.payer,
                min_bin_id,
                max_bin_id,
                x_amount: self.input_amount,
                y_amount,
                strategy: self.strategy,
            })
            .await?;

        let instructions = drop_leading(instructions, ctx.settings.liquidity_leading_instructions);
        if instructions.is_empty() {
            return Err(ResolveError::LiquidityBuildFailed(
                "service returned no deposit instructions".to_string(),
            ));
        }
        Ok(Resolution::ready(instructions).with_signer(position))
    }
}

#[async_trait]
impl Resolve for LiquidityRemoveParams {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        let positions = ctx.liquidity.positions(&self.pool, &ctx.payer).await?;
        let position = positions
            .first()
            .ok_or(ResolveError::NoPositionFound(self.pool))?;
        debug!(
            pool = %self.pool,
            position = %position.address,
            total_positions = positions.len(),
            "Withdrawing from first position"
        );

        let instructions = ctx
            .liquidity
            .remove_liquidity(&RemoveLiquidityRequest {
                pool: self.pool,
                position: position.address,
                owner: ctx.payer,
                from_bin_id: position.lower_bin_id,
                to_bin_id: position.upper_bin_id,
                bps: REMOVE_ALL_BPS,
                claim_and_close: true,
            })
            .await?;

        let instructions = drop_leading(instructions, ctx.settings.liquidity_leading_instructions);
        if instructions.is_empty() {
            return Err(ResolveError::LiquidityBuildFailed(
                "service returned no withdrawal instructions".to_string(),
            ));
        }
        Ok(Resolution::ready(instructions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::{PendingInstruction, ResolverSettings};
    use crate::services::{LiquidityPosition, StrategyType};
    use crate::test_utils::{MockLiquidityService, MockQuoteService};
    use crate::tokens::TokenRegistry;
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_bin_range_is_symmetric() {
        assert_eq!(bin_range(100, 10).unwrap(), (90, 110));
        assert_eq!(bin_range(-5, 10).unwrap(), (-15, 5));
        assert_eq!(bin_range(0, 0).unwrap(), (0, 0));
        assert!(bin_range(i32::MAX, 1).is_err());
        assert!(bin_range(0, u32::MAX).is_err());
    }

    #[tokio::test]
    async fn test_add_returns_position_signer_and_drops_setup() {
        let payer = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let liquidity = MockLiquidityService::with_active_bin(pool, 42).with_fill_y(777);
        let quote = MockQuoteService::no_route();
        let tokens = TokenRegistry::default();
        let ctx = ResolveContext {
            payer,
            quote: &quote,
            liquidity: &liquidity,
            tokens: &tokens,
            settings: ResolverSettings::default(),
        };

        let params = LiquidityAddParams {
            pool,
            range_interval: 10,
            strategy: StrategyType::Spot,
            input_amount: 5_000,
        };
        let resolution = params.resolve(&ctx).await.unwrap();

        assert_eq!(resolution.extra_signers.len(), 1);
        let position = resolution.extra_signers[0].pubkey();

        let add = liquidity.add_requests();
        assert_eq!(add.len(), 1);
        assert_eq!(add[0].position, position);
        assert_eq!((add[0].min_bin_id, add[0].max_bin_id), (32, 52));
        assert_eq!(add[0].y_amount, 777);

        // mock emits [setup, open, deposit]; setup is dropped
        assert_eq!(resolution.instructions.len(), 2);
        match &resolution.instructions[0] {
            PendingInstruction::Ready(ix) => {
                assert!(ix.accounts.iter().any(|a| a.pubkey == position && a.is_signer))
            }
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_uses_first_position_full_range() {
        let payer = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let first = LiquidityPosition {
            address: Pubkey::new_unique(),
            lower_bin_id: -3,
            upper_bin_id: 17,
        };
        let second = LiquidityPosition {
            address: Pubkey::new_unique(),
            lower_bin_id: 0,
            upper_bin_id: 1,
        };
        let liquidity =
            MockLiquidityService::with_active_bin(pool, 0).with_positions(vec![first, second]);
        let quote = MockQuoteService::no_route();
        let tokens = TokenRegistry::default();
        let ctx = ResolveContext {
            payer,
            quote: &quote,
            liquidity: &liquidity,
            tokens: &tokens,
            settings: ResolverSettings::default(),
        };

        let resolution = LiquidityRemoveParams { pool }.resolve(&ctx).await.unwrap();
        assert!(resolution.extra_signers.is_empty());
        assert!(!resolution.instructions.is_empty());

        let removed = liquidity.remove_requests();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].position, first.address);
        assert_eq!((removed[0].from_bin_id, removed[0].to_bin_id), (-3, 17));
        assert_eq!(removed[0].bps, 10_000);
        assert!(removed[0].claim_and_close);
    }

    #[tokio::test]
    async fn test_remove_without_position_fails() {
        let pool = Pubkey::new_unique();
        let liquidity = MockLiquidityService::with_active_bin(pool, 0);
        let quote = MockQuoteService::no_route();
        let tokens = TokenRegistry::default();
        let ctx = ResolveContext {
            payer: Pubkey::new_unique(),
            quote: &quote,
            liquidity: &liquidity,
            tokens: &tokens,
            settings: ResolverSettings::default(),
        };

        assert_eq!(
            LiquidityRemoveParams { pool }.resolve(&ctx).await.unwrap_err(),
            ResolveError::NoPositionFound(pool)
        );
    }
}
