//! JSON instruction wire format
//!
//! HTTP liquidity adapters and generic action nodes both describe
//! instructions as `{ programId, accounts: [{ pubkey, isSigner, isWritable }],
//! data }` with base64 data.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

use super::ServiceError;

/// Largest instruction payload accepted from a wire description; a whole
/// serialized transaction cannot exceed this.
pub const MAX_INSTRUCTION_DATA_LEN: usize = 1232;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountJson {
    pub pubkey: String,
    #[serde(default)]
    pub is_signer: bool,
    #[serde(default)]
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionJson {
    pub program_id: String,
    #[serde(default)]
    pub accounts: Vec<AccountJson>,
    #[serde(default)]
    pub data: String,
}

impl AccountJson {
    pub fn to_account_meta(&self) -> Result<AccountMeta, ServiceError> {
        let pubkey = Pubkey::from_str(&self.pubkey)
            .map_err(|e| ServiceError::Decode(format!("invalid account {}: {}", self.pubkey, e)))?;
        Ok(AccountMeta {
            pubkey,
            is_signer: self.is_signer,
            is_writable: self.is_writable,
        })
    }
}

impl InstructionJson {
    pub fn to_instruction(&self) -> Result<Instruction, ServiceError> {
        let program_id = Pubkey::from_str(&self.program_id).map_err(|e| {
            ServiceError::Decode(format!("invalid program_id {}: {}", self.program_id, e))
        })?;
        let data = decode_data(&self.data)?;
        let accounts = self
            .accounts
            .iter()
            .map(AccountJson::to_account_meta)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }
}

impl From<&Instruction> for InstructionJson {
    fn from(ix: &Instruction) -> Self {
        Self {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| AccountJson {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: BASE64_STANDARD.encode(&ix.data),
        }
    }
}

/// Decode base64 instruction data, enforcing the size ceiling.
pub fn decode_data(data_b64: &str) -> Result<Vec<u8>, ServiceError> {
    let data = BASE64_STANDARD
        .decode(data_b64)
        .map_err(|e| ServiceError::Decode(format!("base64 decode error: {}", e)))?;

    if data.len() > MAX_INSTRUCTION_DATA_LEN {
        return Err(ServiceError::Decode(format!(
            "instruction data too large ({} bytes, max {})",
            data.len(),
            MAX_INSTRUCTION_DATA_LEN
        )));
    }
    Ok(data)
}
