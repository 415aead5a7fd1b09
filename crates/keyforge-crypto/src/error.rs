use keyforge_types::TypesError;
use thiserror::Error;

/// Errors that can occur in key derivation, keystore and signing operations.
///
/// Messages name the failing stage and input position only. They never carry
/// key material, seeds, passwords or mnemonic words.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid entropy length: expected 16, 20, 24, 28 or 32 bytes, got {0}")]
    InvalidEntropyLength(usize),

    #[error("Invalid mnemonic checksum")]
    InvalidChecksum,

    #[error("Invalid mnemonic word count: expected 12, 15, 18, 21 or 24, got {0}")]
    InvalidWordCount(usize),

    #[error("Unknown mnemonic word at position {position}")]
    InvalidWord { position: usize },

    #[error("Invalid derivation path: {0}")]
    InvalidPathSyntax(String),

    #[error("Hardened child {index}' requires a private key")]
    HardenedDerivationRequiresPrivateKey { index: u32 },

    #[error("Path segment {segment} ({index}') is hardened but the node is public-only")]
    PathAppliesHardenedToPublicOnlyNode { segment: usize, index: u32 },

    #[error("Derived key for child {index:#010x} is invalid, retry with the next index")]
    InvalidDerivedKey { index: u32 },

    #[error("No valid child index at or after {0:#010x}")]
    ChildIndexExhausted(u32),

    #[error("Maximum derivation depth exceeded")]
    MaxDepthExceeded,

    #[error("Invalid seed length: expected 16..=64 bytes, got {0}")]
    InvalidSeedLength(usize),

    #[error("Seed produces an invalid master key")]
    InvalidMasterKey,

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Node has no private key")]
    NoPrivateKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Keystore authentication failed: wrong password or corrupted document")]
    AuthenticationFailed,

    #[error("Keystore error: {0}")]
    KeystoreError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl CryptoError {
    /// Whether the caller can recover by retrying with the next child index.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CryptoError::InvalidDerivedKey { .. })
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(e: std::io::Error) -> Self {
        CryptoError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(e: serde_json::Error) -> Self {
        CryptoError::Serialization(e.to_string())
    }
}

impl From<k256::ecdsa::Error> for CryptoError {
    fn from(_: k256::ecdsa::Error) -> Self {
        CryptoError::InvalidSignature
    }
}
