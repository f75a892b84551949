//! Per-kind instruction resolvers
//!
//! Each node kind turns its parameters into instructions through
//! [`Resolve::resolve`]. Transfers and generic actions are pure; swaps and
//! liquidity operations call out to the quoting and liquidity services.
//!
//! Swap output is not materialized here: instructions that still reference
//! lookup tables stay [`PendingInstruction::Compressed`] until the compiler
//! has fetched every table the workflow needs.

pub mod generic;
pub mod liquidity;
pub mod swap;
pub mod transfer;

use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction, message::VersionedMessage, pubkey::Pubkey, signature::Keypair,
};
use std::sync::Arc;
use thiserror::Error;

use crate::services::{LiquidityService, QuoteService, ServiceError};
use crate::tokens::TokenRegistry;
use crate::workflow::NodeAction;

/// Resolver failures; all of them abort the compile
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("quote unavailable for {input_mint} -> {output_mint}")]
    QuoteUnavailable {
        input_mint: Pubkey,
        output_mint: Pubkey,
    },

    #[error("swap build failed: {0}")]
    SwapBuildFailed(String),

    #[error("liquidity build failed: {0}")]
    LiquidityBuildFailed(String),

    #[error("no position found in pool {0}")]
    NoPositionFound(Pubkey),

    #[error("bin range around {active_bin} with interval {interval} overflows")]
    InvalidRange { active_bin: i32, interval: u32 },

    #[error("account {0} must sign but is not the payer")]
    UnsupportedSigner(Pubkey),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ResolveError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) | Self::InvalidAmount(_) | Self::UnknownToken(_) => "input",
            Self::QuoteUnavailable { .. } => "quote",
            Self::SwapBuildFailed(_) => "swap",
            Self::LiquidityBuildFailed(_) | Self::NoPositionFound(_) | Self::InvalidRange { .. } => {
                "liquidity"
            }
            Self::UnsupportedSigner(_) => "signer",
            Self::Service(_) => "service",
        }
    }
}

/// An instruction as produced by a resolver
#[derive(Debug, Clone, PartialEq)]
pub enum PendingInstruction {
    /// Fully materialized
    Ready(Instruction),
    /// Instruction `index` of a prebuilt message whose accounts may live in
    /// lookup tables
    Compressed {
        message: Arc<VersionedMessage>,
        index: usize,
    },
}

/// Output of one resolver call
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub instructions: Vec<PendingInstruction>,
    /// Fresh keypairs (e.g. new position accounts) that must co-sign
    pub extra_signers: Vec<Arc<Keypair>>,
    /// Lookup tables referenced by compressed instructions
    pub lookup_tables: Vec<Pubkey>,
}

impl Resolution {
    pub fn ready(instructions: impl IntoIterator<Item = Instruction>) -> Self {
        Self {
            instructions: instructions
                .into_iter()
                .map(PendingInstruction::Ready)
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_signer(mut self, signer: Keypair) -> Self {
        self.extra_signers.push(Arc::new(signer));
        self
    }
}

/// Leading instructions of external builds that belong to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub swap_leading_instructions: usize,
    pub liquidity_leading_instructions: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            swap_leading_instructions: 2,
            liquidity_leading_instructions: 1,
        }
    }
}

/// Everything a resolver may consult
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub payer: Pubkey,
    pub quote: &'a dyn QuoteService,
    pub liquidity: &'a dyn LiquidityService,
    pub tokens: &'a TokenRegistry,
    pub settings: ResolverSettings,
}

#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError>;
}

#[async_trait]
impl Resolve for NodeAction {
    async fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, ResolveError> {
        match self {
            NodeAction::Transfer(params) => params.resolve(ctx).await,
            NodeAction::Swap(params) => params.resolve(ctx).await,
            NodeAction::LiquidityAdd(params) => params.resolve(ctx).await,
            NodeAction::LiquidityRemove(params) => params.resolve(ctx).await,
            NodeAction::GenericAction(params) => params.resolve(ctx).await,
        }
    }
}

/// Drop the first `count` instructions of an external build
pub(crate) fn drop_leading<T>(mut items: Vec<T>, count: usize) -> Vec<T> {
    let count = count.min(items.len());
    items.drain(..count);
    items
}
