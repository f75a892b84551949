//! Token id -> mint registry used by swap nodes

use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::warn;

const DEFAULT_TOKENS: &[(&str, &str)] = &[
    ("SOL", "So11111111111111111111111111111111111111112"),
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
    ("JUP", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN"),
    ("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263"),
];

/// Maps the token ids shown on swap nodes to mint addresses
///
/// Ids are matched case-insensitively. An id that is itself a valid base58
/// address resolves to that address.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    mints: HashMap<String, Pubkey>,
}

impl TokenRegistry {
    /// Built-in tokens merged with `overrides`; unparseable overrides are
    /// logged and ignored
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut registry = Self::default();
        for (id, mint) in overrides {
            match Pubkey::from_str(mint) {
                Ok(mint) => {
                    registry.mints.insert(id.to_ascii_uppercase(), mint);
                }
                Err(e) => warn!(token = %id, mint = %mint, error = %e, "Ignoring invalid token mint"),
            }
        }
        registry
    }

    pub fn resolve(&self, id: &str) -> Option<Pubkey> {
        let id = id.trim();
        self.mints
            .get(&id.to_ascii_uppercase())
            .copied()
            .or_else(|| Pubkey::from_str(id).ok())
    }

    pub fn len(&self) -> usize {
        self.mints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mints.is_empty()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        let mints = DEFAULT_TOKENS
            .iter()
            .filter_map(|(id, mint)| Some((id.to_string(), Pubkey::from_str(mint).ok()?)))
            .collect();
        Self { mints }
    }
}
