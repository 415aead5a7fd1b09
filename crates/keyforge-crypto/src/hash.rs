//! Hash helpers used across derivation, keystores and signing.

use crate::error::CryptoError;
use hmac::{Hmac, Mac};
use keyforge_types::Hash;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

/// Compute SHA-256 of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256, as used for Base58Check checksums
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160(SHA-256(data)), the BIP-32 key identifier
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// Compute Keccak-256 of data
pub fn keccak256(data: &[u8]) -> Hash {
    Hash::compute(data)
}

/// Compute Keccak-256 over several slices
pub fn keccak256_multi(data: &[&[u8]]) -> Hash {
    Hash::compute_multi(data)
}

/// HMAC-SHA512. The output usually contains key material.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>, CryptoError> {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
