//! External collaborators consumed by the compiler
//!
//! Every service is an async trait so the compiler and the execution
//! coordinator can run against the real network adapters in production and
//! against deterministic mocks in tests:
//!
//! - **ledger**: blockhash, account reads, simulation, submission, confirmation
//! - **quote**: swap quoting and swap-transaction building
//! - **liquidity**: pool state, positions and liquidity instruction building
//! - **wire**: JSON instruction format shared by HTTP adapters and node params

pub mod ledger;
pub mod liquidity;
pub mod quote;
pub mod wire;

pub use ledger::{Confirmation, Ledger, RpcLedger};
pub use liquidity::{
    ActiveBin, AddLiquidityRequest, HttpLiquidityService, LiquidityPosition, LiquidityService,
    PoolState, RemoveLiquidityRequest, StrategyAmountRequest, StrategyType,
};
pub use quote::{JupiterClient, Quote, QuoteRequest, QuoteService, SwapTransaction};

use thiserror::Error;

/// Errors raised by external service adapters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Transport failure before a response was received
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// Non-success HTTP status
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Solana RPC failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Confirmation did not arrive within the configured window
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Adapter is not configured (e.g. missing base URL)
    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<solana_client::client_error::ClientError> for ServiceError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        Self::Rpc(err.to_string())
    }
}
