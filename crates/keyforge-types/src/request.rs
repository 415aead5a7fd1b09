//! JSON transaction requests.
//!
//! Mirrors the `eth_sendTransaction` parameter object: quantities may be JSON
//! numbers, decimal strings or `0x` hex strings.

use crate::address::Address;
use crate::error::TypesError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

/// A numeric field as it appears in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(u64),
    Text(String),
}

impl Quantity {
    pub fn to_u128(&self, field: &'static str) -> Result<u128, TypesError> {
        let text = match self {
            Quantity::Number(n) => return Ok(*n as u128),
            Quantity::Text(t) => t.trim(),
        };
        let invalid = || TypesError::InvalidQuantity {
            field,
            value: text.to_string(),
        };
        // from_str_radix accepts a leading '+', quantities are digits only
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(digits) if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) => {
                return Err(invalid())
            }
            Some(digits) => u128::from_str_radix(digits, 16),
            None if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(invalid())
            }
            None => text.parse::<u128>(),
        };
        parsed.map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow => TypesError::FieldOutOfRange {
                field,
                reason: format!("{text} exceeds 128 bits"),
            },
            _ => invalid(),
        })
    }

    pub fn to_u64(&self, field: &'static str) -> Result<u64, TypesError> {
        let wide = self.to_u128(field)?;
        u64::try_from(wide).map_err(|_| TypesError::FieldOutOfRange {
            field,
            reason: format!("{wide} exceeds 64 bits"),
        })
    }
}

impl From<u64> for Quantity {
    fn from(n: u64) -> Self {
        Quantity::Number(n)
    }
}

/// Unsigned transaction as supplied by a caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub nonce: Quantity,
    pub gas_price: Quantity,
    #[serde(alias = "gas")]
    pub gas_limit: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    /// `0x`-prefixed call data
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Quantity>,
}

impl TryFrom<TransactionRequest> for Transaction {
    type Error = TypesError;

    fn try_from(req: TransactionRequest) -> Result<Self, Self::Error> {
        let data = match req.data.as_deref() {
            None => Vec::new(),
            Some(hex_str) => hex::decode(hex_str.strip_prefix("0x").unwrap_or(hex_str))?,
        };
        let tx = Transaction {
            nonce: req.nonce.to_u64("nonce")?,
            gas_price: req.gas_price.to_u128("gas_price")?,
            gas_limit: req.gas_limit.to_u64("gas_limit")?,
            to: req.to,
            value: req
                .value
                .as_ref()
                .map(|v| v.to_u128("value"))
                .transpose()?
                .unwrap_or(0),
            data,
            chain_id: req
                .chain_id
                .as_ref()
                .map(|c| c.to_u64("chain_id"))
                .transpose()?,
        };
        tx.validate()?;
        Ok(tx)
    }
}

impl From<&Transaction> for TransactionRequest {
    fn from(tx: &Transaction) -> Self {
        Self {
            nonce: Quantity::Number(tx.nonce),
            gas_price: Quantity::Text(format!("{:#x}", tx.gas_price)),
            gas_limit: Quantity::Number(tx.gas_limit),
            to: tx.to,
            value: Some(Quantity::Text(format!("{:#x}", tx.value))),
            data: (!tx.data.is_empty()).then(|| format!("0x{}", hex::encode(&tx.data))),
            chain_id: tx.chain_id.map(Quantity::Number),
        }
    }
}
