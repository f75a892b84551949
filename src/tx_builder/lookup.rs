//! Address lookup table resolution
//!
//! Tables are independent reads, so every referenced table is fetched
//! concurrently. A missing table is fatal: the instructions that reference
//! it cannot be expanded.

use futures::future::try_join_all;
use itertools::Itertools;
use solana_sdk::{
    address_lookup_table::{state::AddressLookupTable, AddressLookupTableAccount},
    pubkey::Pubkey,
};
use tracing::debug;

use super::errors::CompileError;
use crate::metrics::metrics;
use crate::services::Ledger;

/// Decode raw lookup-table account data
pub fn decode_lookup_table(
    key: Pubkey,
    data: &[u8],
) -> Result<AddressLookupTableAccount, CompileError> {
    let table = AddressLookupTable::deserialize(data).map_err(|e| CompileError::LookupTableInvalid {
        table: key,
        reason: e.to_string(),
    })?;
    Ok(AddressLookupTableAccount {
        key,
        addresses: table.addresses.to_vec(),
    })
}

async fn fetch_one(ledger: &dyn Ledger, key: Pubkey) -> Result<AddressLookupTableAccount, CompileError> {
    let data = ledger
        .account_data(&key)
        .await?
        .ok_or(CompileError::LookupTableUnavailable(key))?;
    decode_lookup_table(key, &data)
}

/// Fetch every distinct table in `keys`, preserving first-seen order
pub async fn resolve_lookup_tables(
    ledger: &dyn Ledger,
    keys: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>, CompileError> {
    let unique: Vec<Pubkey> = keys.iter().copied().unique().collect();
    if unique.is_empty() {
        return Ok(Vec::new());
    }

    let tables = try_join_all(unique.iter().map(|key| fetch_one(ledger, *key))).await?;
    metrics().lookup_tables_fetched.inc_by(tables.len() as u64);
    debug!(
        tables = tables.len(),
        addresses = tables.iter().map(|t| t.addresses.len()).sum::<usize>(),
        "Resolved lookup tables"
    );
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{lookup_table_data, MockLedger};

    #[tokio::test]
    async fn test_tables_fetched_once_in_order() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let a_addresses = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let b_addresses = vec![Pubkey::new_unique()];

        let ledger = MockLedger::default();
        ledger.set_account(a, lookup_table_data(&a_addresses));
        ledger.set_account(b, lookup_table_data(&b_addresses));

        let tables = resolve_lookup_tables(&ledger, &[b, a, b]).await.unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].key, b);
        assert_eq!(tables[0].addresses, b_addresses);
        assert_eq!(tables[1].key, a);
        assert_eq!(tables[1].addresses, a_addresses);
    }

    #[tokio::test]
    async fn test_missing_table_is_fatal() {
        let present = Pubkey::new_unique();
        let missing = Pubkey::new_unique();
        let ledger = MockLedger::default();
        ledger.set_account(present, lookup_table_data(&[Pubkey::new_unique()]));

        let err = resolve_lookup_tables(&ledger, &[present, missing])
            .await
            .unwrap_err();
        assert_eq!(err, CompileError::LookupTableUnavailable(missing));
    }

    #[test]
    fn test_garbage_table_data_rejected() {
        let key = Pubkey::new_unique();
        assert!(matches!(
            decode_lookup_table(key, &[1, 2, 3]),
            Err(CompileError::LookupTableInvalid { .. })
        ));
    }
}
