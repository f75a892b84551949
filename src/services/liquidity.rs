//! Concentrated-liquidity pool service
//!
//! Pools are divided into price bins; a position covers a contiguous bin
//! range. The service reports pool and position state, computes the paired
//! deposit amount for a distribution strategy, and builds the instructions
//! to open a position and deposit or to withdraw and close.
//!
//! `HttpLiquidityService` talks to a JSON sidecar that wraps the pool SDK and
//! returns instructions in the [`wire`](super::wire) format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de, Deserialize, Deserializer, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::wire::InstructionJson;
use super::ServiceError;
use crate::config::LiquidityConfig;
use crate::metrics::Timer;

/// Liquidity distribution across the bin range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyType {
    Spot,
    Curve,
    BidAsk,
}

impl StrategyType {
    pub fn as_u8(self) -> u8 {
        match self {
            StrategyType::Spot => 0,
            StrategyType::Curve => 1,
            StrategyType::BidAsk => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StrategyType::Spot),
            1 => Some(StrategyType::Curve),
            2 => Some(StrategyType::BidAsk),
            _ => None,
        }
    }
}

impl FromStr for StrategyType {
    type Err = String;

    /// Accepts `0`/`1`/`2` or the strategy name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Self::from_u8(n).ok_or_else(|| format!("unknown strategy {}", n));
        }
        match trimmed.to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "spot" => Ok(StrategyType::Spot),
            "curve" => Ok(StrategyType::Curve),
            "bidask" => Ok(StrategyType::BidAsk),
            _ => Err(format!("unknown strategy {}", trimmed)),
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyType::Spot => "spot",
            StrategyType::Curve => "curve",
            StrategyType::BidAsk => "bidAsk",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBin {
    pub bin_id: i32,
    pub x_amount: u64,
    pub y_amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub address: Pubkey,
    pub active_bin: ActiveBin,
    pub bin_step: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub address: Pubkey,
    pub lower_bin_id: i32,
    pub upper_bin_id: i32,
}

/// Paired Y amount for depositing `x_amount` across `[min_bin_id, max_bin_id]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyAmountRequest {
    pub pool: Pubkey,
    pub active_bin_id: i32,
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub x_amount: u64,
    pub strategy: StrategyType,
}

/// Open `position` and deposit both sides by strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLiquidityRequest {
    pub pool: Pubkey,
    pub position: Pubkey,
    pub owner: Pubkey,
    pub min_bin_id: i32,
    pub max_bin_id: i32,
    pub x_amount: u64,
    pub y_amount: u64,
    pub strategy: StrategyType,
}

/// Withdraw `bps` of the liquidity in `[from_bin_id, to_bin_id]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveLiquidityRequest {
    pub pool: Pubkey,
    pub position: Pubkey,
    pub owner: Pubkey,
    pub from_bin_id: i32,
    pub to_bin_id: i32,
    pub bps: u16,
    pub claim_and_close: bool,
}

#[async_trait]
pub trait LiquidityService: Send + Sync {
    async fn pool_state(&self, pool: &Pubkey) -> Result<PoolState, ServiceError>;

    /// Positions held by `owner` in `pool`, in the order the pool reports them
    async fn positions(
        &self,
        pool: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Vec<LiquidityPosition>, ServiceError>;

    async fn fill_y_by_strategy(&self, request: &StrategyAmountRequest) -> Result<u64, ServiceError>;

    /// Every instruction the pool SDK produces, leading setup included
    async fn add_liquidity_by_strategy(
        &self,
        request: &AddLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError>;

    /// Every instruction the pool SDK produces, leading setup included
    async fn remove_liquidity(
        &self,
        request: &RemoveLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError>;
}

// Sidecar response shapes

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveBinResponse {
    bin_id: i32,
    #[serde(default, deserialize_with = "flexible_u64")]
    x_amount: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    y_amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolStateResponse {
    active_bin: ActiveBinResponse,
    #[serde(default)]
    bin_step: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionResponse {
    address: String,
    lower_bin_id: i32,
    upper_bin_id: i32,
}

#[derive(Deserialize)]
struct PositionsResponse {
    #[serde(default)]
    positions: Vec<PositionResponse>,
}

#[derive(Deserialize)]
struct AmountResponse {
    #[serde(deserialize_with = "flexible_u64")]
    amount: u64,
}

#[derive(Deserialize)]
struct InstructionsResponse {
    #[serde(default)]
    instructions: Vec<InstructionJson>,
}

/// Amounts arrive as JSON numbers or as decimal strings (big-number output)
fn flexible_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn parse_pubkey(value: &str) -> Result<Pubkey, ServiceError> {
    Pubkey::from_str(value)
        .map_err(|e| ServiceError::Decode(format!("invalid address {}: {}", value, e)))
}

/// HTTP client for the liquidity sidecar
#[derive(Debug, Clone)]
pub struct HttpLiquidityService {
    http: Client,
    base_url: Option<String>,
}

impl HttpLiquidityService {
    pub fn new(config: &LiquidityConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ServiceError::from)?;
        Ok(Self {
            http,
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    fn url(&self, path: &str) -> Result<String, ServiceError> {
        let base = self.base_url.as_ref().ok_or_else(|| {
            ServiceError::NotConfigured("liquidity.base_url is not set".to_string())
        })?;
        Ok(format!("{}{}", base, path))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ServiceError> {
        let url = self.url(path)?;
        let timer = Timer::with_name("liquidity_latency_seconds");
        let resp = self.http.post(&url).json(&body).send().await?;
        timer.finish();
        Self::read_json(resp).await
    }

    fn decode_instructions(resp: InstructionsResponse) -> Result<Vec<Instruction>, ServiceError> {
        resp.instructions
            .iter()
            .map(InstructionJson::to_instruction)
            .collect()
    }
}

#[async_trait]
impl LiquidityService for HttpLiquidityService {
    async fn pool_state(&self, pool: &Pubkey) -> Result<PoolState, ServiceError> {
        let url = self.url(&format!("/pools/{}", pool))?;
        let timer = Timer::with_name("liquidity_latency_seconds");
        let resp = self.http.get(&url).send().await?;
        timer.finish();

        let state: PoolStateResponse = Self::read_json(resp).await?;
        debug!(%pool, active_bin = state.active_bin.bin_id, "Fetched pool state");
        Ok(PoolState {
            address: *pool,
            active_bin: ActiveBin {
                bin_id: state.active_bin.bin_id,
                x_amount: state.active_bin.x_amount,
                y_amount: state.active_bin.y_amount,
            },
            bin_step: state.bin_step,
        })
    }

    async fn positions(
        &self,
        pool: &Pubkey,
        owner: &Pubkey,
    ) -> Result<Vec<LiquidityPosition>, ServiceError> {
        let url = self.url(&format!("/pools/{}/positions", pool))?;
        let timer = Timer::with_name("liquidity_latency_seconds");
        let resp = self
            .http
            .get(&url)
            .query(&[("owner", owner.to_string())])
            .send()
            .await?;
        timer.finish();

        let body: PositionsResponse = Self::read_json(resp).await?;
        body.positions
            .into_iter()
            .map(|p| {
                Ok(LiquidityPosition {
                    address: parse_pubkey(&p.address)?,
                    lower_bin_id: p.lower_bin_id,
                    upper_bin_id: p.upper_bin_id,
                })
            })
            .collect()
    }

    async fn fill_y_by_strategy(&self, request: &StrategyAmountRequest) -> Result<u64, ServiceError> {
        let body = serde_json::json!({
            "pool": request.pool.to_string(),
            "activeBinId": request.active_bin_id,
            "minBinId": request.min_bin_id,
            "maxBinId": request.max_bin_id,
            "xAmount": request.x_amount.to_string(),
            "strategyType": request.strategy.as_u8(),
        });
        let resp: AmountResponse = self.post_json("/strategy/fill-y", body).await?;
        Ok(resp.amount)
    }

    async fn add_liquidity_by_strategy(
        &self,
        request: &AddLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError> {
        let body = serde_json::json!({
            "pool": request.pool.to_string(),
            "position": request.position.to_string(),
            "user": request.owner.to_string(),
            "totalXAmount": request.x_amount.to_string(),
            "totalYAmount": request.y_amount.to_string(),
            "strategy": {
                "minBinId": request.min_bin_id,
                "maxBinId": request.max_bin_id,
                "strategyType": request.strategy.as_u8(),
            },
        });
        let resp: InstructionsResponse = self.post_json("/liquidity/add", body).await?;
        Self::decode_instructions(resp)
    }

    async fn remove_liquidity(
        &self,
        request: &RemoveLiquidityRequest,
    ) -> Result<Vec<Instruction>, ServiceError> {
        let body = serde_json::json!({
            "pool": request.pool.to_string(),
            "position": request.position.to_string(),
            "user": request.owner.to_string(),
            "fromBinId": request.from_bin_id,
            "toBinId": request.to_bin_id,
            "bps": request.bps,
            "shouldClaimAndClose": request.claim_and_close,
        });
        let resp: InstructionsResponse = self.post_json("/liquidity/remove", body).await?;
        Self::decode_instructions(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("0".parse::<StrategyType>(), Ok(StrategyType::Spot));
        assert_eq!("1".parse::<StrategyType>(), Ok(StrategyType::Curve));
        assert_eq!("bid-ask".parse::<StrategyType>(), Ok(StrategyType::BidAsk));
        assert_eq!("BidAsk".parse::<StrategyType>(), Ok(StrategyType::BidAsk));
        assert!("3".parse::<StrategyType>().is_err());
        assert!("wide".parse::<StrategyType>().is_err());
    }

    #[test]
    fn test_pool_state_accepts_string_amounts() {
        let state: PoolStateResponse = serde_json::from_value(serde_json::json!({
            "activeBin": { "binId": -12, "xAmount": "123456789012", "yAmount": 5 },
            "binStep": 25
        }))
        .unwrap();
        assert_eq!(state.active_bin.bin_id, -12);
        assert_eq!(state.active_bin.x_amount, 123_456_789_012);
        assert_eq!(state.active_bin.y_amount, 5);
        assert_eq!(state.bin_step, 25);
    }

    #[tokio::test]
    async fn test_unconfigured_service_reports_not_configured() {
        let service = HttpLiquidityService::new(&LiquidityConfig::default()).unwrap();
        let err = service.pool_state(&Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(_)));
    }
}
