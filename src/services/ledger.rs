//! Ledger access
//!
//! The compiler reads the latest blockhash, lookup-table accounts and
//! simulation results; the execution coordinator submits and confirms.
//! `RpcLedger` is the JSON-RPC implementation over the nonblocking
//! `solana_client` RPC client.

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSimulateTransactionConfig};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::ServiceError;
use crate::metrics::Timer;

/// Outcome of waiting for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Landed at the configured commitment without error
    Confirmed,
    /// Landed but the runtime rejected it
    Failed(String),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Latest blockhash at the configured commitment
    async fn latest_blockhash(&self) -> Result<Hash, ServiceError>;

    /// Raw account data, `None` when the account does not exist
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ServiceError>;

    /// Compute units consumed by a simulation of `tx`, `None` when the
    /// simulation produced no usable estimate
    async fn simulate_compute_units(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Option<u64>, ServiceError>;

    /// Submit a fully signed transaction
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, ServiceError>;

    /// Wait for `signature` to reach the configured commitment
    async fn confirm_transaction(&self, signature: &Signature)
        -> Result<Confirmation, ServiceError>;
}

/// JSON-RPC backed ledger
pub struct RpcLedger {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.client.url())
            .field("commitment", &self.commitment.commitment)
            .field("poll_interval", &self.poll_interval)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish()
    }
}

impl RpcLedger {
    pub fn new(
        url: String,
        commitment: CommitmentConfig,
        poll_interval: Duration,
        confirm_timeout: Duration,
    ) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(url, commitment)),
            commitment,
            poll_interval,
            confirm_timeout,
        }
    }

    pub fn from_config(config: &crate::config::RpcConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.commitment_config(),
            Duration::from_millis(config.confirm_poll_interval_ms),
            Duration::from_secs(config.confirm_timeout_secs),
        )
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn latest_blockhash(&self) -> Result<Hash, ServiceError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let blockhash = self.client.get_latest_blockhash().await?;
        timer.finish();
        Ok(blockhash)
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ServiceError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let account = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?
            .value;
        timer.finish();
        Ok(account.map(|account| account.data))
    }

    async fn simulate_compute_units(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Option<u64>, ServiceError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.commitment),
            ..RpcSimulateTransactionConfig::default()
        };

        let timer = Timer::with_name("rpc_latency_seconds");
        let result = self
            .client
            .simulate_transaction_with_config(tx, config)
            .await?
            .value;
        timer.finish();

        if let Some(err) = result.err {
            warn!(error = ?err, logs = ?result.logs, "Simulation reported a transaction error");
            return Ok(None);
        }
        Ok(result.units_consumed)
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, ServiceError> {
        let timer = Timer::with_name("rpc_latency_seconds");
        let signature = self.client.send_transaction(tx).await?;
        timer.finish();
        Ok(signature)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Confirmation, ServiceError> {
        let started = Instant::now();
        loop {
            let status = self
                .client
                .get_signature_status_with_commitment(signature, self.commitment)
                .await?;

            match status {
                Some(Ok(())) => return Ok(Confirmation::Confirmed),
                Some(Err(err)) => return Ok(Confirmation::Failed(err.to_string())),
                None => {
                    if started.elapsed() >= self.confirm_timeout {
                        return Err(ServiceError::Timeout(self.confirm_timeout.as_secs()));
                    }
                    debug!(%signature, "Signature not yet confirmed, polling");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}
