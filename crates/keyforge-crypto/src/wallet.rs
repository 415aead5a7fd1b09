//! Single-account wallet built on an HD node.

use crate::error::CryptoError;
use crate::hd::{DerivationPath, HDNode};
use crate::mnemonic::Mnemonic;
use crate::signer;
use keyforge_types::{Address, Hash, Signature, SignedTransaction, Transaction};
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

/// Where an HD wallet's key came from.
#[derive(Clone, PartialEq, Eq)]
pub struct HdOrigin {
    mnemonic: Mnemonic,
    path: DerivationPath,
    passphrase_protected: bool,
}

impl HdOrigin {
    pub fn mnemonic(&self) -> &Mnemonic {
        &self.mnemonic
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Whether the seed was stretched with a non-empty passphrase.
    pub fn passphrase_protected(&self) -> bool {
        self.passphrase_protected
    }
}

/// A signing account. Always holds a private key.
#[derive(Clone, PartialEq, Eq)]
pub struct Wallet {
    node: HDNode,
    origin: Option<HdOrigin>,
}

impl Wallet {
    /// Derive the account at `path` from a mnemonic and passphrase.
    pub fn from_mnemonic(
        mnemonic: Mnemonic,
        passphrase: &str,
        path: DerivationPath,
    ) -> Result<Self, CryptoError> {
        let seed = mnemonic.to_seed(passphrase);
        let node = HDNode::from_seed(&seed)?.derive_path(&path)?;
        Ok(Self {
            node,
            origin: Some(HdOrigin {
                mnemonic,
                path,
                passphrase_protected: !passphrase.is_empty(),
            }),
        })
    }

    /// Parse a phrase and derive the account at `path`.
    pub fn from_phrase(
        phrase: &str,
        passphrase: &str,
        path: DerivationPath,
    ) -> Result<Self, CryptoError> {
        Self::from_mnemonic(Mnemonic::parse(phrase)?, passphrase, path)
    }

    /// Generate a fresh mnemonic and derive the first Ethereum account.
    pub fn generate<R: RngCore + CryptoRng>(
        word_count: usize,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        let mnemonic = Mnemonic::generate(word_count, rng)?;
        Self::from_mnemonic(mnemonic, "", DerivationPath::ethereum(0)?)
    }

    /// Wallet for a bare private key, without HD origin.
    pub fn from_private_key(key: &[u8; 32]) -> Result<Self, CryptoError> {
        Ok(Self {
            node: HDNode::from_private_key(key)?,
            origin: None,
        })
    }

    pub fn address(&self) -> Address {
        self.node.address()
    }

    pub fn node(&self) -> &HDNode {
        &self.node
    }

    pub fn origin(&self) -> Option<&HdOrigin> {
        self.origin.as_ref()
    }

    pub fn path(&self) -> Option<&DerivationPath> {
        self.origin.as_ref().map(|o| &o.path)
    }

    pub fn sign_digest(&self, digest: &Hash) -> Result<Signature, CryptoError> {
        signer::sign_digest(&self.node, digest)
    }

    pub fn sign_transaction(&self, tx: &Transaction) -> Result<SignedTransaction, CryptoError> {
        signer::sign_transaction(&self.node, tx)
    }

    /// Sign an EIP-191 personal message.
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        signer::sign_message(&self.node, message)
    }

    /// Raw private key bytes. Explicit export only.
    pub fn export_private_key(&self) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        self.node.private_key_bytes().ok_or(CryptoError::NoPrivateKey)
    }

    /// `0x`-prefixed hex private key.
    pub fn export_private_key_hex(&self) -> Result<Zeroizing<String>, CryptoError> {
        let key = self.export_private_key()?;
        Ok(Zeroizing::new(format!("0x{}", hex::encode(&key[..]))))
    }

    /// Mnemonic phrase, if this wallet has an HD origin.
    pub fn export_phrase(&self) -> Option<Zeroizing<String>> {
        self.origin.as_ref().map(|o| o.mnemonic.phrase())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("path", &self.path().map(|p| p.to_string()))
            .finish_non_exhaustive()
    }
}
