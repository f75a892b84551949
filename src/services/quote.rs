//! Swap quoting service
//!
//! Two calls make up a swap: a quote for `(input mint, output mint, amount,
//! slippage)` and a build step that turns the quote into a serialized,
//! unsigned versioned transaction paying from the caller's wallet.
//! `JupiterClient` talks to the Jupiter swap API over HTTP.

use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, transaction::VersionedTransaction};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use super::ServiceError;
use crate::config::QuoteConfig;
use crate::metrics::Timer;

/// Parameters for a single swap quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Amount of the input token in base units
    pub amount: u64,
    pub slippage_bps: u16,
}

/// Opaque quote; handed back verbatim to the build step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quote(pub serde_json::Value);

impl Quote {
    pub fn in_amount(&self) -> Option<u64> {
        self.amount_field("inAmount")
    }

    pub fn out_amount(&self) -> Option<u64> {
        self.amount_field("outAmount")
    }

    fn amount_field(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// Serialized swap transaction as returned by the build step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransaction {
    /// base64 of the bincode-serialized `VersionedTransaction`
    pub swap_transaction: String,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
}

impl SwapTransaction {
    pub fn from_transaction(tx: &VersionedTransaction) -> Result<Self, ServiceError> {
        let bytes = bincode::serialize(tx).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(Self {
            swap_transaction: BASE64_STANDARD.encode(bytes),
            last_valid_block_height: None,
        })
    }

    pub fn decode(&self) -> Result<VersionedTransaction, ServiceError> {
        let bytes = BASE64_STANDARD
            .decode(&self.swap_transaction)
            .map_err(|e| ServiceError::Decode(format!("base64 decode error: {}", e)))?;
        bincode::deserialize(&bytes)
            .map_err(|e| ServiceError::Decode(format!("transaction decode error: {}", e)))
    }
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Quote a swap; `Ok(None)` when no route is available
    async fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, ServiceError>;

    /// Build the swap transaction for `quote`; `Ok(None)` when the service
    /// answered without a transaction
    async fn build_swap_transaction(
        &self,
        quote: &Quote,
        payer: &Pubkey,
    ) -> Result<Option<SwapTransaction>, ServiceError>;
}

/// HTTP client for the Jupiter swap API
pub struct JupiterClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    restrict_intermediate_tokens: bool,
    max_priority_fee_lamports: u64,
    priority_level: String,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for JupiterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JupiterClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl JupiterClient {
    pub fn new(config: &QuoteConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(ServiceError::from)?;

        let limiter = NonZeroU32::new(config.rate_limit_rps)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            restrict_intermediate_tokens: config.restrict_intermediate_tokens,
            max_priority_fee_lamports: config.max_priority_fee_lamports,
            priority_level: config.priority_level.clone(),
            limiter,
        })
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}

#[async_trait]
impl QuoteService for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<Option<Quote>, ServiceError> {
        self.throttle().await;

        let url = format!("{}/quote", self.base_url);
        let req = self.http.get(&url).query(&[
            ("inputMint", request.input_mint.to_string()),
            ("outputMint", request.output_mint.to_string()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
            (
                "restrictIntermediateTokens",
                self.restrict_intermediate_tokens.to_string(),
            ),
        ]);

        let timer = Timer::with_name("quote_latency_seconds");
        let resp = self.with_auth(req).send().await?;
        timer.finish();

        if !resp.status().is_success() {
            warn!(
                status = %resp.status(),
                input_mint = %request.input_mint,
                output_mint = %request.output_mint,
                "Quote API returned non-success status"
            );
            return Ok(None);
        }

        let body: serde_json::Value = resp.json().await?;
        if body.is_null() || body.get("error").is_some() {
            debug!(body = %body, "Quote API returned no route");
            return Ok(None);
        }

        let quote = Quote(body);
        if quote.out_amount().is_none() {
            debug!("Quote response without outAmount treated as no route");
            return Ok(None);
        }
        Ok(Some(quote))
    }

    async fn build_swap_transaction(
        &self,
        quote: &Quote,
        payer: &Pubkey,
    ) -> Result<Option<SwapTransaction>, ServiceError> {
        self.throttle().await;

        let payload = serde_json::json!({
            "quoteResponse": quote,
            "userPublicKey": payer.to_string(),
            "dynamicComputeUnitLimit": true,
            "dynamicSlippage": true,
            "prioritizationFeeLamports": {
                "priorityLevelWithMaxLamports": {
                    "maxLamports": self.max_priority_fee_lamports,
                    "priorityLevel": self.priority_level,
                }
            }
        });

        let url = format!("{}/swap", self.base_url);
        let timer = Timer::with_name("quote_latency_seconds");
        let resp = self
            .with_auth(self.http.post(&url).json(&payload))
            .send()
            .await?;
        timer.finish();

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = resp.json().await?;
        if body.get("swapTransaction").and_then(|v| v.as_str()).is_none() {
            return Ok(None);
        }
        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_amount_accessors() {
        let quote = Quote(serde_json::json!({
            "inAmount": "1000000",
            "outAmount": 42,
        }));
        assert_eq!(quote.in_amount(), Some(1_000_000));
        assert_eq!(quote.out_amount(), Some(42));
    }

    #[test]
    fn test_swap_transaction_rejects_garbage() {
        let swap = SwapTransaction {
            swap_transaction: "!!!".to_string(),
            last_valid_block_height: None,
        };
        assert!(matches!(swap.decode(), Err(ServiceError::Decode(_))));
    }
}
