//! Typed node descriptors
//!
//! A descriptor is one validated workflow step. Parameters are checked when
//! the descriptor is built, so a resolver never sees a half-filled or
//! malformed node.

use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};
use std::fmt;
use thiserror::Error;

use crate::services::StrategyType;

/// Default swap slippage when a node does not set one
pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;

/// Ceiling for any basis-point parameter
pub const MAX_BPS: u16 = 10_000;

/// Why a node was excluded from compilation
///
/// These are never fatal: the node is reported and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown node type '{0}'")]
    UnknownKind(String),

    #[error("missing required parameter '{0}'")]
    MissingParam(&'static str),

    #[error("invalid address for '{param}': {value}")]
    InvalidAddress { param: &'static str, value: String },

    #[error("invalid amount for '{param}': {value}")]
    InvalidAmount { param: &'static str, value: String },

    #[error("invalid value for '{param}': {value} ({reason})")]
    InvalidValue {
        param: &'static str,
        value: String,
        reason: String,
    },

    #[error("'{field}' must be a non-negative integer, got {value}")]
    InvalidOrdering { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Transfer,
    Swap,
    LiquidityAdd,
    LiquidityRemove,
    GenericAction,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Transfer => "transfer",
            NodeKind::Swap => "swap",
            NodeKind::LiquidityAdd => "liquidityAdd",
            NodeKind::LiquidityRemove => "liquidityRemove",
            NodeKind::GenericAction => "genericAction",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub destination: Pubkey,
    pub amount_lamports: u64,
}

/// Tokens are named by registry id (or raw mint) and resolved at compile time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub sell_token: String,
    pub buy_token: String,
    /// Input amount in the sell token's base units
    pub amount: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityAddParams {
    pub pool: Pubkey,
    /// Bins on each side of the active bin
    pub range_interval: u32,
    pub strategy: StrategyType,
    /// X-side deposit in base units
    pub input_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityRemoveParams {
    pub pool: Pubkey,
}

/// Raw instruction described by an external program schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericActionParams {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Kind-specific parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    Transfer(TransferParams),
    Swap(SwapParams),
    LiquidityAdd(LiquidityAddParams),
    LiquidityRemove(LiquidityRemoveParams),
    GenericAction(GenericActionParams),
}

impl NodeAction {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeAction::Transfer(_) => NodeKind::Transfer,
            NodeAction::Swap(_) => NodeKind::Swap,
            NodeAction::LiquidityAdd(_) => NodeKind::LiquidityAdd,
            NodeAction::LiquidityRemove(_) => NodeKind::LiquidityRemove,
            NodeAction::GenericAction(_) => NodeKind::GenericAction,
        }
    }

    /// Check the constraints a typed value can still violate
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            NodeAction::Transfer(p) => {
                if p.amount_lamports == 0 {
                    return Err(ValidationError::InvalidAmount {
                        param: "amountLamports",
                        value: "0".to_string(),
                    });
                }
            }
            NodeAction::Swap(p) => {
                if p.sell_token.trim().is_empty() {
                    return Err(ValidationError::MissingParam("sellTokenId"));
                }
                if p.buy_token.trim().is_empty() {
                    return Err(ValidationError::MissingParam("buyTokenId"));
                }
                if p.amount == 0 {
                    return Err(ValidationError::InvalidAmount {
                        param: "amount",
                        value: "0".to_string(),
                    });
                }
                if p.slippage_bps > MAX_BPS {
                    return Err(ValidationError::InvalidValue {
                        param: "slippageBps",
                        value: p.slippage_bps.to_string(),
                        reason: format!("must be <= {}", MAX_BPS),
                    });
                }
            }
            NodeAction::LiquidityAdd(p) => {
                if p.input_amount == 0 {
                    return Err(ValidationError::InvalidAmount {
                        param: "inputAmount",
                        value: "0".to_string(),
                    });
                }
                if p.range_interval > i32::MAX as u32 / 2 {
                    return Err(ValidationError::InvalidValue {
                        param: "rangeInterval",
                        value: p.range_interval.to_string(),
                        reason: "out of range".to_string(),
                    });
                }
            }
            NodeAction::LiquidityRemove(_) => {}
            NodeAction::GenericAction(p) => {
                if p.data.len() > crate::services::wire::MAX_INSTRUCTION_DATA_LEN {
                    return Err(ValidationError::InvalidValue {
                        param: "data",
                        value: format!("{} bytes", p.data.len()),
                        reason: "instruction data too large".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One validated workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: String,
    pub label: String,
    pub order_id: u32,
    /// Carried through; does not affect ordering
    pub group_id: u32,
    pub is_active: bool,
    pub action: NodeAction,
}

impl NodeDescriptor {
    /// Active descriptor in group 0; the action is validated
    pub fn new(
        id: impl Into<String>,
        order_id: u32,
        action: NodeAction,
    ) -> Result<Self, ValidationError> {
        action.validate()?;
        let id = id.into();
        Ok(Self {
            label: id.clone(),
            id,
            order_id,
            group_id: 0,
            is_active: true,
            action,
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.action.kind()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} '{}' ({})", self.order_id, self.id, self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_transfer_rejected() {
        let action = NodeAction::Transfer(TransferParams {
            destination: Pubkey::new_unique(),
            amount_lamports: 0,
        });
        assert!(matches!(
            NodeDescriptor::new("t1", 1, action),
            Err(ValidationError::InvalidAmount { param: "amountLamports", .. })
        ));
    }

    #[test]
    fn test_swap_slippage_ceiling() {
        let mut params = SwapParams {
            sell_token: "SOL".to_string(),
            buy_token: "USDC".to_string(),
            amount: 1_000,
            slippage_bps: MAX_BPS,
        };
        assert!(NodeAction::Swap(params.clone()).validate().is_ok());
        params.slippage_bps = MAX_BPS + 1;
        assert!(NodeAction::Swap(params).validate().is_err());
    }

    #[test]
    fn test_display_names_order_and_kind() {
        let node = NodeDescriptor::new(
            "rm",
            3,
            NodeAction::LiquidityRemove(LiquidityRemoveParams {
                pool: Pubkey::new_unique(),
            }),
        )
        .unwrap();
        assert_eq!(node.to_string(), "node 3 'rm' (liquidityRemove)");
        assert!(node.is_active);
        assert!(!node.clone().inactive().is_active);
    }
}
