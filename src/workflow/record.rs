//! Persisted action records
//!
//! This is the loosely typed JSON shape workflows are stored in:
//!
//! ```json
//! { "id": "n1", "type": "transferNode", "position": { "x": 0, "y": 0 },
//!   "data": { "label": "Pay", "isActive": true, "groupId": 0, "orderId": 1,
//!             "args": { "address": "...", "amount": "500000000" } } }
//! ```
//!
//! `ActionRecord::to_descriptor` is the single validation point between the
//! stored shape and the typed [`NodeDescriptor`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use super::node::{
    GenericActionParams, LiquidityAddParams, LiquidityRemoveParams, NodeAction, NodeDescriptor,
    SwapParams, TransferParams, ValidationError, DEFAULT_SLIPPAGE_BPS,
};
use crate::services::wire::{self, AccountJson, InstructionJson};
use crate::services::StrategyType;

/// Canvas position; carried for the editor, ignored by compilation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, deserialize_with = "flexible_i64")]
    pub group_id: i64,
    #[serde(default, deserialize_with = "flexible_i64")]
    pub order_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub data: ActionData,
}

fn default_true() -> bool {
    true
}

/// Stored in place of an ordering key that is not an integer
///
/// Deserialization never fails on a bad key; the record is reported as an
/// `InvalidOrdering` warning when the snapshot is captured.
pub const MALFORMED_ORDERING: i64 = i64::MIN;

/// Ordering keys arrive as numbers or numeric strings
fn flexible_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or(MALFORMED_ORDERING),
        Value::String(s) if s.trim().is_empty() => 0,
        Value::String(s) => s.trim().parse().unwrap_or(MALFORMED_ORDERING),
        Value::Null => 0,
        _ => MALFORMED_ORDERING,
    })
}

/// Node type tags as written by the editor
mod tags {
    pub const TRANSFER: &[&str] = &["transfer", "transferNode"];
    pub const SWAP: &[&str] = &["swap", "jupiterNode"];
    pub const LIQUIDITY_ADD: &str = "liquidityAdd";
    pub const LIQUIDITY_REMOVE: &str = "liquidityRemove";
    pub const LIQUIDITY_SERVICE: &str = "meteoraNode";
    pub const GENERIC: &[&str] = &["genericAction", "customNode"];
}

enum Tag {
    Transfer,
    Swap,
    LiquidityAdd,
    LiquidityRemove,
    Generic,
}

impl ActionRecord {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, order_id: i64) -> Self {
        let id = id.into();
        Self {
            data: ActionData {
                label: id.clone(),
                is_active: true,
                args: Map::new(),
                group_id: 0,
                order_id,
            },
            id,
            node_type: node_type.into(),
            position: None,
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.args.insert(key.to_string(), value.into());
        self
    }

    /// Label for reporting; falls back to the id
    pub fn display_label(&self) -> &str {
        if self.data.label.trim().is_empty() {
            &self.id
        } else {
            &self.data.label
        }
    }

    /// Validate into a typed descriptor
    pub fn to_descriptor(&self) -> Result<NodeDescriptor, ValidationError> {
        let order_id = ordering("orderId", self.data.order_id)?;
        let group_id = ordering("groupId", self.data.group_id)?;
        let args = &self.data.args;

        let action = match self.tag()? {
            Tag::Transfer => NodeAction::Transfer(TransferParams {
                destination: address(args, "destinationAddress", &["address"])?,
                amount_lamports: amount(args, "amountLamports", &["amount"])?,
            }),
            Tag::Swap => NodeAction::Swap(SwapParams {
                sell_token: required(args, "sellTokenId", &["sellingToken"])?,
                buy_token: required(args, "buyTokenId", &["buyingToken"])?,
                amount: amount(args, "amount", &["swapAmount"])?,
                slippage_bps: match optional(args, "slippageBps", &["slippage"]) {
                    Some(raw) => raw.parse().map_err(|_| ValidationError::InvalidValue {
                        param: "slippageBps",
                        value: raw.clone(),
                        reason: "not a basis-point integer".to_string(),
                    })?,
                    None => DEFAULT_SLIPPAGE_BPS,
                },
            }),
            Tag::LiquidityAdd => NodeAction::LiquidityAdd(LiquidityAddParams {
                pool: address(args, "poolAddress", &[])?,
                range_interval: {
                    let raw = required(args, "rangeInterval", &["totalRangeInterval"])?;
                    raw.parse().map_err(|_| ValidationError::InvalidValue {
                        param: "rangeInterval",
                        value: raw.clone(),
                        reason: "not a bin count".to_string(),
                    })?
                },
                strategy: {
                    let raw = required(args, "strategyType", &[])?;
                    StrategyType::from_str(&raw).map_err(|reason| ValidationError::InvalidValue {
                        param: "strategyType",
                        value: raw.clone(),
                        reason,
                    })?
                },
                input_amount: amount(args, "inputAmount", &["inputTokenAmount"])?,
            }),
            Tag::LiquidityRemove => NodeAction::LiquidityRemove(LiquidityRemoveParams {
                pool: address(args, "poolAddress", &[])?,
            }),
            Tag::Generic => NodeAction::GenericAction(generic_params(args)?),
        };
        action.validate()?;

        Ok(NodeDescriptor {
            id: self.id.clone(),
            label: self.display_label().to_string(),
            order_id,
            group_id,
            is_active: self.data.is_active,
            action,
        })
    }

    fn tag(&self) -> Result<Tag, ValidationError> {
        let t = self.node_type.as_str();
        if tags::TRANSFER.contains(&t) {
            return Ok(Tag::Transfer);
        }
        if tags::SWAP.contains(&t) {
            return Ok(Tag::Swap);
        }
        if tags::GENERIC.contains(&t) {
            return Ok(Tag::Generic);
        }
        match t {
            tags::LIQUIDITY_ADD => Ok(Tag::LiquidityAdd),
            tags::LIQUIDITY_REMOVE => Ok(Tag::LiquidityRemove),
            tags::LIQUIDITY_SERVICE => {
                match required(&self.data.args, "serviceType", &[])?.as_str() {
                    "addLiquidity" => Ok(Tag::LiquidityAdd),
                    "removeLiquidity" => Ok(Tag::LiquidityRemove),
                    other => Err(ValidationError::InvalidValue {
                        param: "serviceType",
                        value: other.to_string(),
                        reason: "expected addLiquidity or removeLiquidity".to_string(),
                    }),
                }
            }
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

impl From<&NodeDescriptor> for ActionRecord {
    /// Canonical record with the canonical argument names
    fn from(node: &NodeDescriptor) -> Self {
        let (node_type, args) = match &node.action {
            NodeAction::Transfer(p) => (
                tags::TRANSFER[0],
                serde_json::json!({
                    "destinationAddress": p.destination.to_string(),
                    "amountLamports": p.amount_lamports.to_string(),
                }),
            ),
            NodeAction::Swap(p) => (
                tags::SWAP[0],
                serde_json::json!({
                    "sellTokenId": p.sell_token,
                    "buyTokenId": p.buy_token,
                    "amount": p.amount.to_string(),
                    "slippageBps": p.slippage_bps,
                }),
            ),
            NodeAction::LiquidityAdd(p) => (
                tags::LIQUIDITY_ADD,
                serde_json::json!({
                    "poolAddress": p.pool.to_string(),
                    "rangeInterval": p.range_interval,
                    "strategyType": p.strategy.as_u8(),
                    "inputAmount": p.input_amount.to_string(),
                }),
            ),
            NodeAction::LiquidityRemove(p) => (
                tags::LIQUIDITY_REMOVE,
                serde_json::json!({ "poolAddress": p.pool.to_string() }),
            ),
            NodeAction::GenericAction(p) => {
                let ix = solana_sdk::instruction::Instruction {
                    program_id: p.program_id,
                    accounts: p.accounts.clone(),
                    data: p.data.clone(),
                };
                let json = InstructionJson::from(&ix);
                (
                    tags::GENERIC[0],
                    serde_json::json!({
                        "programId": json.program_id,
                        "accounts": json.accounts,
                        "data": json.data,
                    }),
                )
            }
        };

        Self {
            id: node.id.clone(),
            node_type: node_type.to_string(),
            position: None,
            data: ActionData {
                label: node.label.clone(),
                is_active: node.is_active,
                args: match args {
                    Value::Object(map) => map,
                    _ => Map::new(),
                },
                group_id: i64::from(node.group_id),
                order_id: i64::from(node.order_id),
            },
        }
    }
}

fn ordering(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::InvalidOrdering {
        field,
        value: if value == MALFORMED_ORDERING {
            "a non-integer value".to_string()
        } else {
            value.to_string()
        },
    })
}

/// First non-empty value under `key` or one of its aliases, as a string
fn optional(args: &Map<String, Value>, key: &str, aliases: &[&str]) -> Option<String> {
    std::iter::once(key)
        .chain(aliases.iter().copied())
        .filter_map(|k| args.get(k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn required(
    args: &Map<String, Value>,
    key: &'static str,
    aliases: &[&str],
) -> Result<String, ValidationError> {
    optional(args, key, aliases).ok_or(ValidationError::MissingParam(key))
}

fn address(
    args: &Map<String, Value>,
    key: &'static str,
    aliases: &[&str],
) -> Result<Pubkey, ValidationError> {
    let raw = required(args, key, aliases)?;
    Pubkey::from_str(&raw).map_err(|_| ValidationError::InvalidAddress {
        param: key,
        value: raw,
    })
}

/// Positive integer amount in base units
fn amount(
    args: &Map<String, Value>,
    key: &'static str,
    aliases: &[&str],
) -> Result<u64, ValidationError> {
    let raw = required(args, key, aliases)?;
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ValidationError::InvalidAmount {
            param: key,
            value: raw,
        }),
    }
}

fn generic_params(args: &Map<String, Value>) -> Result<GenericActionParams, ValidationError> {
    let program_id = address(args, "programId", &[])?;

    // accounts may be stored as an array or as its JSON string
    let accounts: Vec<AccountJson> = match args.get("accounts") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(Value::String(s)) => serde_json::from_str(s).map_err(|e| invalid_accounts(s, e))?,
        Some(other) => serde_json::from_value(other.clone())
            .map_err(|e| invalid_accounts(&other.to_string(), e))?,
    };
    let accounts = accounts
        .iter()
        .map(|a| {
            a.to_account_meta().map_err(|_| ValidationError::InvalidAddress {
                param: "accounts",
                value: a.pubkey.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let data = match optional(args, "data", &[]) {
        Some(raw) => wire::decode_data(&raw).map_err(|e| ValidationError::InvalidValue {
            param: "data",
            value: raw.clone(),
            reason: e.to_string(),
        })?,
        None => Vec::new(),
    };

    Ok(GenericActionParams {
        program_id,
        accounts,
        data,
    })
}

fn invalid_accounts(value: &str, err: serde_json::Error) -> ValidationError {
    ValidationError::InvalidValue {
        param: "accounts",
        value: value.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::NodeKind;

    #[test]
    fn test_editor_transfer_record() {
        let dest = Pubkey::new_unique();
        let record: ActionRecord = serde_json::from_value(serde_json::json!({
            "id": "n1",
            "type": "transferNode",
            "position": { "x": 10.0, "y": 20.5 },
            "data": {
                "label": "Pay rent",
                "isActive": true,
                "groupId": "0",
                "orderId": 2,
                "args": { "address": dest.to_string(), "amount": 500000000 }
            }
        }))
        .unwrap();

        let node = record.to_descriptor().unwrap();
        assert_eq!(node.order_id, 2);
        assert_eq!(node.label, "Pay rent");
        assert_eq!(
            node.action,
            NodeAction::Transfer(TransferParams {
                destination: dest,
                amount_lamports: 500_000_000,
            })
        );
    }

    #[test]
    fn test_meteora_service_type_selects_kind() {
        let pool = Pubkey::new_unique();
        let add = ActionRecord::new("m1", "meteoraNode", 1)
            .with_arg("serviceType", "addLiquidity")
            .with_arg("poolAddress", pool.to_string())
            .with_arg("totalRangeInterval", "10")
            .with_arg("strategyType", "2")
            .with_arg("inputTokenAmount", "1000");
        let node = add.to_descriptor().unwrap();
        assert_eq!(node.kind(), NodeKind::LiquidityAdd);
        match node.action {
            NodeAction::LiquidityAdd(p) => {
                assert_eq!(p.range_interval, 10);
                assert_eq!(p.strategy, StrategyType::BidAsk);
            }
            other => panic!("unexpected action {:?}", other),
        }

        let remove = ActionRecord::new("m2", "meteoraNode", 2)
            .with_arg("serviceType", "removeLiquidity")
            .with_arg("poolAddress", pool.to_string());
        assert_eq!(remove.to_descriptor().unwrap().kind(), NodeKind::LiquidityRemove);

        let unknown = ActionRecord::new("m3", "meteoraNode", 3).with_arg("serviceType", "swap");
        assert!(matches!(
            unknown.to_descriptor(),
            Err(ValidationError::InvalidValue { param: "serviceType", .. })
        ));
    }

    #[test]
    fn test_incomplete_and_invalid_records() {
        let missing = ActionRecord::new("s1", "jupiterNode", 1)
            .with_arg("sellingToken", "SOL")
            .with_arg("buyingToken", "")
            .with_arg("swapAmount", "100");
        assert_eq!(
            missing.to_descriptor(),
            Err(ValidationError::MissingParam("buyTokenId"))
        );

        let bad_amount = ActionRecord::new("t1", "transfer", 1)
            .with_arg("destinationAddress", Pubkey::new_unique().to_string())
            .with_arg("amountLamports", "1.5");
        assert!(matches!(
            bad_amount.to_descriptor(),
            Err(ValidationError::InvalidAmount { .. })
        ));

        let bad_address = ActionRecord::new("t2", "transfer", 1)
            .with_arg("destinationAddress", "ADDR1")
            .with_arg("amountLamports", "5");
        assert!(matches!(
            bad_address.to_descriptor(),
            Err(ValidationError::InvalidAddress { .. })
        ));

        let negative = ActionRecord::new("t3", "transfer", -1);
        assert_eq!(
            negative.to_descriptor(),
            Err(ValidationError::InvalidOrdering {
                field: "orderId",
                value: "-1".to_string()
            })
        );

        let unknown = ActionRecord::new("x", "chatNode", 1);
        assert_eq!(
            unknown.to_descriptor(),
            Err(ValidationError::UnknownKind("chatNode".to_string()))
        );
    }

    #[test]
    fn test_swap_slippage_defaults() {
        let record = ActionRecord::new("s1", "swap", 1)
            .with_arg("sellTokenId", "SOL")
            .with_arg("buyTokenId", "USDC")
            .with_arg("amount", 1_000_000u64);
        match record.to_descriptor().unwrap().action {
            NodeAction::Swap(p) => assert_eq!(p.slippage_bps, DEFAULT_SLIPPAGE_BPS),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_generic_action_accounts_as_string() {
        let program = Pubkey::new_unique();
        let account = Pubkey::new_unique();
        let accounts = serde_json::json!([
            { "pubkey": account.to_string(), "isSigner": false, "isWritable": true }
        ]);
        let record = ActionRecord::new("g1", "customNode", 1)
            .with_arg("programId", program.to_string())
            .with_arg("accounts", accounts.to_string())
            .with_arg("data", "AQI=");

        match record.to_descriptor().unwrap().action {
            NodeAction::GenericAction(p) => {
                assert_eq!(p.program_id, program);
                assert_eq!(p.accounts.len(), 1);
                assert!(p.accounts[0].is_writable);
                assert_eq!(p.data, vec![1, 2]);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_to_record_is_parseable() {
        let node = NodeDescriptor::new(
            "add",
            4,
            NodeAction::LiquidityAdd(LiquidityAddParams {
                pool: Pubkey::new_unique(),
                range_interval: 5,
                strategy: StrategyType::Curve,
                input_amount: 42,
            }),
        )
        .unwrap()
        .with_label("Add range");

        let record = ActionRecord::from(&node);
        assert_eq!(record.node_type, "liquidityAdd");
        assert_eq!(record.to_descriptor().unwrap(), node);
    }

    #[test]
    fn test_non_integer_ordering_is_reported_not_fatal() {
        let records: Vec<ActionRecord> = serde_json::from_value(serde_json::json!([
            { "id": "a", "type": "transferNode", "data": { "orderId": "abc" } },
            { "id": "b", "type": "transferNode", "data": { "orderId": 1.5 } },
            { "id": "c", "type": "transferNode", "data": { "orderId": 1, "groupId": [1] } }
        ]))
        .unwrap();

        assert_eq!(
            records[0].to_descriptor(),
            Err(ValidationError::InvalidOrdering {
                field: "orderId",
                value: "a non-integer value".to_string()
            })
        );
        assert_eq!(records[1].data.order_id, MALFORMED_ORDERING);
        assert!(matches!(
            records[2].to_descriptor(),
            Err(ValidationError::InvalidOrdering { field: "groupId", .. })
        ));
    }
}
