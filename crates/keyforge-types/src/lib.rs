//! Keyforge Types - plain data types shared by the keyforge crates.
//!
//! - Addresses (20-byte, EIP-55 checksummed)
//! - Hashes (32-byte, Keccak-256 digests)
//! - Recoverable secp256k1 signatures
//! - Legacy / EIP-155 transactions and their RLP encoding

pub mod address;
pub mod error;
pub mod hash;
pub mod rlp;
pub mod signature;
pub mod transaction;

#[cfg(feature = "serde")]
pub mod request;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use error::TypesError;
pub use hash::Hash;
pub use signature::Signature;
pub use transaction::{SignedTransaction, Transaction};

#[cfg(feature = "serde")]
pub use request::{Quantity, TransactionRequest};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Hash, Signature, SignedTransaction, Transaction, TypesError};
}
