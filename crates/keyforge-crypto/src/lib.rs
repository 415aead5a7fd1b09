//! Keyforge Crypto - key management for Ethereum-style accounts.
//!
//! This crate provides:
//! - BIP-39 mnemonics and seed derivation
//! - BIP-32 hierarchical deterministic key trees (secp256k1)
//! - Web3 Secret Storage keystores
//! - Deterministic ECDSA signing of legacy and EIP-155 transactions

pub mod error;
pub mod hash;
pub mod hd;
pub mod keystore;
pub mod mnemonic;
pub mod seed;
pub mod signer;
pub mod wallet;

pub use error::CryptoError;
pub use hd::{ChildNumber, DerivationPath, HDNode};
pub use keystore::{check_keystore, decrypt, encrypt, Cipher, Kdf, KeystoreDocument, KeystoreOptions};
pub use mnemonic::{entropy_to_mnemonic, mnemonic_to_entropy, Mnemonic};
pub use seed::{mnemonic_to_seed, Seed};
pub use signer::{
    hash_message, recover_address, recover_sender, sign_digest, sign_message, sign_transaction,
    verify,
};
pub use wallet::Wallet;
