use thiserror::Error;

/// Errors that can occur in type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address length: expected 20, got {0}")]
    InvalidAddressLength(usize),

    #[error("Address checksum mismatch: {0}")]
    InvalidAddressChecksum(String),

    #[error("Invalid hash length: expected 32, got {0}")]
    InvalidHashLength(usize),

    #[error("Invalid signature length: expected 65, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u64),

    #[error("Field '{field}' out of range: {reason}")]
    FieldOutOfRange { field: &'static str, reason: String },

    #[error("Invalid quantity for '{field}': {value}")]
    InvalidQuantity { field: &'static str, value: String },

    #[error("RLP error: {0}")]
    Rlp(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for TypesError {
    fn from(e: hex::FromHexError) -> Self {
        TypesError::InvalidHex(e.to_string())
    }
}

impl From<std::array::TryFromSliceError> for TypesError {
    fn from(_: std::array::TryFromSliceError) -> Self {
        TypesError::Rlp("slice length mismatch".to_string())
    }
}
