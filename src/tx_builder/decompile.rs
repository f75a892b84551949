//! Expanding compiled instructions back into `Instruction`s
//!
//! A V0 message addresses accounts by index into the concatenation of its
//! static keys, then every table's writable entries, then every table's
//! readonly entries. Signer and writability flags come from the header.

use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    instruction::{AccountMeta, Instruction},
    message::VersionedMessage,
    pubkey::Pubkey,
};
use std::collections::HashMap;

use super::errors::CompileError;
use crate::compat;
use crate::resolvers::PendingInstruction;

/// Full account list of `message` with lookup-table addresses loaded
fn account_keys(
    message: &VersionedMessage,
    tables: &HashMap<Pubkey, &AddressLookupTableAccount>,
) -> Result<(Vec<Pubkey>, usize), CompileError> {
    let static_keys = compat::get_static_account_keys(message);
    let lookups = compat::get_address_table_lookups(message);

    let mut writable = Vec::new();
    let mut readonly = Vec::new();
    for lookup in lookups {
        let table = tables
            .get(&lookup.account_key)
            .ok_or(CompileError::LookupTableUnavailable(lookup.account_key))?;
        let load = |index: &u8| {
            table.addresses.get(*index as usize).copied().ok_or_else(|| {
                CompileError::decompile(format!(
                    "index {} out of range for lookup table {} ({} entries)",
                    index,
                    lookup.account_key,
                    table.addresses.len()
                ))
            })
        };
        for index in &lookup.writable_indexes {
            writable.push(load(index)?);
        }
        for index in &lookup.readonly_indexes {
            readonly.push(load(index)?);
        }
    }

    let loaded_writable = writable.len();
    let mut keys = Vec::with_capacity(static_keys.len() + writable.len() + readonly.len());
    keys.extend_from_slice(static_keys);
    keys.extend(writable);
    keys.extend(readonly);
    Ok((keys, loaded_writable))
}

fn is_writable(message: &VersionedMessage, index: usize, loaded_writable: usize) -> bool {
    let header = compat::get_message_header(message);
    let num_static = compat::get_static_account_keys(message).len();
    let num_signed = header.num_required_signatures as usize;

    if index < num_signed {
        index < num_signed.saturating_sub(header.num_readonly_signed_accounts as usize)
    } else if index < num_static {
        index < num_static.saturating_sub(header.num_readonly_unsigned_accounts as usize)
    } else {
        index - num_static < loaded_writable
    }
}

/// Expand instruction `index` of `message`
pub fn decompile_instruction(
    message: &VersionedMessage,
    index: usize,
    tables: &HashMap<Pubkey, &AddressLookupTableAccount>,
) -> Result<Instruction, CompileError> {
    let compiled = message.instructions().get(index).ok_or_else(|| {
        CompileError::decompile(format!(
            "instruction {} out of range ({} instructions)",
            index,
            message.instructions().len()
        ))
    })?;

    let (keys, loaded_writable) = account_keys(message, tables)?;
    let num_signed = compat::get_message_header(message).num_required_signatures as usize;
    let key_at = |i: u8| {
        keys.get(i as usize).copied().ok_or_else(|| {
            CompileError::decompile(format!(
                "account index {} out of range ({} keys)",
                i,
                keys.len()
            ))
        })
    };

    let program_id = key_at(compiled.program_id_index)?;
    let accounts = compiled
        .accounts
        .iter()
        .map(|&i| {
            Ok(AccountMeta {
                pubkey: key_at(i)?,
                is_signer: (i as usize) < num_signed,
                is_writable: is_writable(message, i as usize, loaded_writable),
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    Ok(Instruction {
        program_id,
        accounts,
        data: compiled.data.clone(),
    })
}

/// Materialize resolver output against the fetched tables
pub fn materialize(
    pending: &[PendingInstruction],
    tables: &[AddressLookupTableAccount],
) -> Result<Vec<Instruction>, CompileError> {
    let by_key: HashMap<Pubkey, &AddressLookupTableAccount> =
        tables.iter().map(|t| (t.key, t)).collect();

    pending
        .iter()
        .map(|p| match p {
            PendingInstruction::Ready(ix) => Ok(ix.clone()),
            PendingInstruction::Compressed { message, index } => {
                decompile_instruction(message, *index, &by_key)
            }
        })
        .collect()
}
