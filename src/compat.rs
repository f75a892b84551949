//! Compatibility layer for versioned Solana messages
//!
//! Workflow compilation handles two message shapes: the V0 messages it
//! produces itself, and whatever the external swap service hands back (V0 in
//! practice, legacy in older integrations). This module gives a single API for
//! headers, static keys, signer slots and lookup-table references regardless
//! of the version.
//!
//! ```rust,no_run
//! use solana_sdk::transaction::VersionedTransaction;
//! use solflow::compat;
//!
//! fn describe(tx: &VersionedTransaction) {
//!     let signers = compat::get_required_signers(&tx.message);
//!     let tables = compat::get_address_table_lookups(&tx.message);
//!     println!("{} signers, {} lookup tables", signers.len(), tables.len());
//! }
//! ```

use solana_sdk::{
    message::{v0::MessageAddressTableLookup, MessageHeader, VersionedMessage},
    pubkey::Pubkey,
};

/// Get the message header from a `VersionedMessage`.
#[inline]
#[must_use]
pub fn get_message_header(message: &VersionedMessage) -> &MessageHeader {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.header,
        VersionedMessage::V0(v0_msg) => &v0_msg.header,
    }
}

/// Get the static account keys from a `VersionedMessage`.
///
/// For V0 messages this excludes addresses loaded through lookup tables.
#[inline]
#[must_use]
pub fn get_static_account_keys(message: &VersionedMessage) -> &[Pubkey] {
    match message {
        VersionedMessage::Legacy(legacy_msg) => &legacy_msg.account_keys,
        VersionedMessage::V0(v0_msg) => &v0_msg.account_keys,
    }
}

/// Get the required signers from a `VersionedMessage`.
///
/// Required signers are always the first `header.num_required_signatures`
/// static keys; the fee payer sits at index 0.
#[inline]
#[must_use]
pub fn get_required_signers(message: &VersionedMessage) -> &[Pubkey] {
    let header = get_message_header(message);
    let account_keys = get_static_account_keys(message);
    let num_signers = header.num_required_signatures as usize;

    &account_keys[..num_signers.min(account_keys.len())]
}

/// Index of `signer` within the signature slots of `message`, if it must sign.
#[inline]
#[must_use]
pub fn signer_index(message: &VersionedMessage, signer: &Pubkey) -> Option<usize> {
    get_required_signers(message)
        .iter()
        .position(|key| key == signer)
}

/// Address lookup table references carried by the message.
///
/// Legacy messages never reference tables, so they yield an empty slice.
#[inline]
#[must_use]
pub fn get_address_table_lookups(message: &VersionedMessage) -> &[MessageAddressTableLookup] {
    match message {
        VersionedMessage::Legacy(_) => &[],
        VersionedMessage::V0(v0_msg) => &v0_msg.address_table_lookups,
    }
}

/// Program id of every compiled instruction, in message order.
///
/// Program ids are always static keys, so no lookup table is needed.
#[must_use]
pub fn get_instruction_program_ids(message: &VersionedMessage) -> Vec<Pubkey> {
    let keys = get_static_account_keys(message);
    message
        .instructions()
        .iter()
        .map(|ix| {
            keys.get(ix.program_id_index as usize)
                .copied()
                .unwrap_or_default()
        })
        .collect()
}
