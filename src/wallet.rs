//! Wallet management and transaction signing

use anyhow::Context;
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::compat;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("wallet is disconnected")]
    Disconnected,

    #[error("{0} is not a required signer of this transaction")]
    NotRequired(Pubkey),

    #[error("transaction is missing signatures from {0:?}")]
    MissingSignatures(Vec<Pubkey>),

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Sign `tx` in the slot that belongs to `signer`
pub fn sign_in_place(tx: &mut VersionedTransaction, signer: &dyn Signer) -> Result<(), SigningError> {
    let pubkey = signer.try_pubkey().map_err(|e| SigningError::Failed(e.to_string()))?;
    let index = compat::signer_index(&tx.message, &pubkey).ok_or(SigningError::NotRequired(pubkey))?;

    let num_required = compat::get_required_signers(&tx.message).len();
    if tx.signatures.len() < num_required {
        tx.signatures.resize(num_required, Signature::default());
    }

    let message_bytes = tx.message.serialize();
    tx.signatures[index] = signer
        .try_sign_message(&message_bytes)
        .map_err(|e| SigningError::Failed(e.to_string()))?;
    Ok(())
}

/// Required signers whose signature slot is still empty
pub fn missing_signatures(tx: &VersionedTransaction) -> Vec<Pubkey> {
    compat::get_required_signers(&tx.message)
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            tx.signatures
                .get(*i)
                .map_or(true, |sig| *sig == Signature::default())
        })
        .map(|(_, key)| *key)
        .collect()
}

/// The connected wallet: exposes the payer address and co-signs
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn is_connected(&self) -> bool;

    /// Add the wallet's signature to a (possibly partially signed) transaction
    async fn sign_transaction(&self, tx: &mut VersionedTransaction) -> Result<(), SigningError>;
}

/// Keypair-backed wallet
pub struct WalletManager {
    keypair: Arc<Keypair>,
    connected: watch::Sender<bool>,
}

impl WalletManager {
    /// Create a new wallet manager from a keypair file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let path = expand_home(path);
        let keypair_bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if keypair_bytes.len() == 64 {
            // Raw bytes format - validate before conversion
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            // JSON format
            let json: Vec<u8> =
                serde_json::from_slice(&keypair_bytes).context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?
        };

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        let (connected, _) = watch::channel(true);
        Self {
            keypair: Arc::new(keypair),
            connected,
        }
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Drop the connection; subscribers observe `false`
    pub fn disconnect(&self) {
        if self.connected.send_replace(false) {
            info!(wallet = %self.keypair.pubkey(), "Wallet disconnected");
        }
    }

    pub fn reconnect(&self) {
        self.connected.send_replace(true);
    }

    /// Connection state updates
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

#[async_trait]
impl WalletSigner for WalletManager {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn sign_transaction(&self, tx: &mut VersionedTransaction) -> Result<(), SigningError> {
        if !self.is_connected() {
            return Err(SigningError::Disconnected);
        }
        sign_in_place(tx, self.keypair.as_ref())
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{hash::Hash, message::Message, message::VersionedMessage};
    #[allow(deprecated)]
    use solana_sdk::system_instruction;
    use std::io::Write;

    fn transfer_tx(payer: &Pubkey) -> VersionedTransaction {
        let ix = system_instruction::transfer(payer, &Pubkey::new_unique(), 1);
        let message = Message::new_with_blockhash(&[ix], Some(payer), &Hash::new_unique());
        VersionedTransaction {
            signatures: vec![Signature::default()],
            message: VersionedMessage::Legacy(message),
        }
    }

    #[tokio::test]
    async fn test_wallet_signs_and_disconnects() {
        let wallet = WalletManager::from_keypair(Keypair::new());
        let mut rx = wallet.subscribe();
        let mut tx = transfer_tx(&wallet.pubkey());
        assert_eq!(missing_signatures(&tx), vec![wallet.pubkey()]);

        wallet.sign_transaction(&mut tx).await.unwrap();
        assert!(missing_signatures(&tx).is_empty());
        assert!(tx.verify_with_results().iter().all(|ok| *ok));

        wallet.disconnect();
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert_eq!(
            wallet.sign_transaction(&mut tx).await,
            Err(SigningError::Disconnected)
        );
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let payer = Keypair::new();
        let stranger = Keypair::new();
        let mut tx = transfer_tx(&payer.pubkey());
        assert_eq!(
            sign_in_place(&mut tx, &stranger),
            Err(SigningError::NotRequired(stranger.pubkey()))
        );
    }

    #[test]
    fn test_keypair_file_formats() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let wallet = WalletManager::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());

        let mut zeros = tempfile::NamedTempFile::new().unwrap();
        zeros.write_all(&[0u8; 64]).unwrap();
        assert!(WalletManager::from_file(zeros.path().to_str().unwrap()).is_err());
    }
}
