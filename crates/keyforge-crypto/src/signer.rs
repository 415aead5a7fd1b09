//! secp256k1 ECDSA signing and recovery for transactions and messages.

use crate::error::CryptoError;
use crate::hash::keccak256_multi;
use crate::hd::HDNode;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use keyforge_types::{Address, Hash, Signature, SignedTransaction, Transaction};

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Sign a 32-byte digest with the node's private key.
///
/// Nonces come from RFC 6979 so the same key and digest always give the
/// same signature. `s` is normalized to the lower half of the curve order.
pub fn sign_digest(node: &HDNode, digest: &Hash) -> Result<Signature, CryptoError> {
    let secret = node.secret_key().ok_or(CryptoError::NoPrivateKey)?;
    let signing_key = SigningKey::from(secret);
    let (signature, recovery_id) = signing_key.sign_prehash_recoverable(digest.as_bytes())?;

    // x-reduced recovery ids cannot be expressed in a transaction `v`
    let recovery_id = recovery_id.to_byte();
    if recovery_id > 1 {
        return Err(CryptoError::InvalidSignature);
    }

    let (r, s) = signature.split_bytes();
    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&r);
    s_bytes.copy_from_slice(&s);
    Ok(Signature::new(r_bytes, s_bytes, recovery_id)?)
}

/// Hash, sign and attach the signature to a transaction.
pub fn sign_transaction(node: &HDNode, tx: &Transaction) -> Result<SignedTransaction, CryptoError> {
    let digest = tx.signing_hash()?;
    tracing::debug!(
        signer = %node.address(),
        nonce = tx.nonce,
        chain_id = ?tx.chain_id,
        "signing transaction"
    );
    let signature = sign_digest(node, &digest)?;
    Ok(SignedTransaction::new(tx.clone(), signature)?)
}

/// EIP-191 personal message hash:
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`.
pub fn hash_message(message: &[u8]) -> Hash {
    let len = message.len().to_string();
    keccak256_multi(&[PERSONAL_MESSAGE_PREFIX, len.as_bytes(), message])
}

/// Sign an EIP-191 personal message.
pub fn sign_message(node: &HDNode, message: &[u8]) -> Result<Signature, CryptoError> {
    sign_digest(node, &hash_message(message))
}

/// Recover the public key that produced `signature` over `digest`.
pub fn recover_public_key(digest: &Hash, signature: &Signature) -> Result<VerifyingKey, CryptoError> {
    let sig = EcdsaSignature::from_scalars(*signature.r(), *signature.s())?;
    let recovery_id =
        RecoveryId::from_byte(signature.recovery_id()).ok_or(CryptoError::InvalidSignature)?;
    Ok(VerifyingKey::recover_from_prehash(
        digest.as_bytes(),
        &sig,
        recovery_id,
    )?)
}

/// Recover the signer's address.
pub fn recover_address(digest: &Hash, signature: &Signature) -> Result<Address, CryptoError> {
    let key = recover_public_key(digest, signature)?;
    let point = key.to_encoded_point(false);
    let mut xy = [0u8; 64];
    xy.copy_from_slice(&point.as_bytes()[1..]);
    Ok(Address::from_uncompressed_public_key(&xy))
}

/// Check that `signature` over `digest` was made by `address`.
pub fn verify(address: &Address, digest: &Hash, signature: &Signature) -> bool {
    recover_address(digest, signature)
        .map(|recovered| recovered == *address)
        .unwrap_or(false)
}

/// Recover the sender of a signed transaction.
pub fn recover_sender(tx: &SignedTransaction) -> Result<Address, CryptoError> {
    let digest = tx.tx().signing_hash()?;
    recover_address(&digest, tx.signature())
}
