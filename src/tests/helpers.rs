//! Shared fixtures for the scenario suites

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::services::{Ledger, LiquidityService, QuoteService, StrategyType};
use crate::test_utils::{MockLedger, MockLiquidityService, MockQuoteService};
use crate::tokens::TokenRegistry;
use crate::tx_builder::{CompilerSettings, WorkflowCompiler};
use crate::workflow::{
    LiquidityAddParams, LiquidityRemoveParams, NodeAction, NodeDescriptor, SwapParams,
    TransferParams,
};

/// Mocks plus a compiler wired to them
pub(crate) struct Harness {
    pub ledger: Arc<MockLedger>,
    pub quote: Arc<MockQuoteService>,
    pub liquidity: Arc<MockLiquidityService>,
}

impl Harness {
    pub fn new(
        ledger: MockLedger,
        quote: MockQuoteService,
        liquidity: MockLiquidityService,
    ) -> Self {
        Self {
            ledger: Arc::new(ledger),
            quote: Arc::new(quote),
            liquidity: Arc::new(liquidity),
        }
    }

    /// Default ledger, no swap route, no pools
    pub fn offline() -> Self {
        Self::new(
            MockLedger::default(),
            MockQuoteService::no_route(),
            MockLiquidityService::default(),
        )
    }

    pub fn compiler(&self) -> WorkflowCompiler {
        self.compiler_with(CompilerSettings::default())
    }

    pub fn compiler_with(&self, settings: CompilerSettings) -> WorkflowCompiler {
        let ledger: Arc<dyn Ledger> = self.ledger.clone();
        let quote: Arc<dyn QuoteService> = self.quote.clone();
        let liquidity: Arc<dyn LiquidityService> = self.liquidity.clone();
        WorkflowCompiler::new(
            ledger,
            quote,
            liquidity,
            Arc::new(TokenRegistry::default()),
            settings,
        )
    }
}

pub(crate) fn transfer_to(id: &str, order_id: u32, destination: Pubkey, lamports: u64) -> NodeDescriptor {
    NodeDescriptor::new(
        id,
        order_id,
        NodeAction::Transfer(TransferParams {
            destination,
            amount_lamports: lamports,
        }),
    )
    .unwrap()
}

pub(crate) fn transfer(id: &str, order_id: u32, lamports: u64) -> NodeDescriptor {
    transfer_to(id, order_id, Pubkey::new_unique(), lamports)
}

pub(crate) fn swap(id: &str, order_id: u32) -> NodeDescriptor {
    NodeDescriptor::new(
        id,
        order_id,
        NodeAction::Swap(SwapParams {
            sell_token: "SOL".to_string(),
            buy_token: "USDC".to_string(),
            amount: 1_000_000,
            slippage_bps: 100,
        }),
    )
    .unwrap()
}

pub(crate) fn liquidity_add(id: &str, order_id: u32, pool: Pubkey) -> NodeDescriptor {
    NodeDescriptor::new(
        id,
        order_id,
        NodeAction::LiquidityAdd(LiquidityAddParams {
            pool,
            range_interval: 5,
            strategy: StrategyType::Spot,
            input_amount: 10_000,
        }),
    )
    .unwrap()
}

pub(crate) fn liquidity_remove(id: &str, order_id: u32, pool: Pubkey) -> NodeDescriptor {
    NodeDescriptor::new(
        id,
        order_id,
        NodeAction::LiquidityRemove(LiquidityRemoveParams { pool }),
    )
    .unwrap()
}
