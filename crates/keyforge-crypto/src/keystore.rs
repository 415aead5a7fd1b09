//! Web3 Secret Storage (v3) keystore codec.
//!
//! The private key is encrypted with AES-CTR under a key stretched from the
//! password with scrypt or PBKDF2-HMAC-SHA256, and authenticated with
//! `keccak256(mac_key || ciphertext)`. HD wallets additionally carry their
//! mnemonic entropy and derivation path in an `x-keyforge` extension so the
//! wallet can be rebuilt with its origin intact.

use crate::error::CryptoError;
use crate::hash::keccak256_multi;
use crate::hd::DerivationPath;
use crate::mnemonic::Mnemonic;
use crate::wallet::Wallet;
use aes::{Aes128, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use k256::elliptic_curve::subtle::ConstantTimeEq;
use keyforge_types::Address;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Document format version written and accepted.
pub const KEYSTORE_VERSION: u32 = 3;
/// Version of the `x-keyforge` extension.
pub const EXTENSION_VERSION: u32 = 1;

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const PRIVATE_KEY_LEN: usize = 32;
const PBKDF2_PRF: &str = "hmac-sha256";
const MNEMONIC_LOCALE: &str = "en";
/// Upper bound on scrypt cost accepted from a document (1 GiB at r = 8).
const MAX_SCRYPT_LOG_N: u8 = 20;
/// scrypt working memory, `128 * r * n` bytes.
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Password stretching function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kdf {
    Scrypt { log_n: u8, r: u32, p: u32 },
    Pbkdf2 { iterations: u32 },
}

impl Kdf {
    pub fn name(&self) -> &'static str {
        match self {
            Kdf::Scrypt { .. } => "scrypt",
            Kdf::Pbkdf2 { .. } => "pbkdf2",
        }
    }
}

/// Symmetric cipher for the key material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cipher {
    #[default]
    Aes128Ctr,
    Aes256Ctr,
}

impl Cipher {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cipher::Aes128Ctr => "aes-128-ctr",
            Cipher::Aes256Ctr => "aes-256-ctr",
        }
    }

    fn key_len(&self) -> usize {
        match self {
            Cipher::Aes128Ctr => 16,
            Cipher::Aes256Ctr => 32,
        }
    }

    /// Derived key length: cipher key followed by an equally long MAC key.
    fn dklen(&self) -> usize {
        self.key_len() * 2
    }

    fn apply(&self, key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<(), CryptoError> {
        let invalid = |_| CryptoError::KeystoreError("invalid cipher key or iv length".into());
        match self {
            Cipher::Aes128Ctr => Aes128Ctr::new_from_slices(key, iv)
                .map_err(invalid)?
                .apply_keystream(buf),
            Cipher::Aes256Ctr => Aes256Ctr::new_from_slices(key, iv)
                .map_err(invalid)?
                .apply_keystream(buf),
        }
        Ok(())
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cipher {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-128-ctr" => Ok(Cipher::Aes128Ctr),
            "aes-256-ctr" => Ok(Cipher::Aes256Ctr),
            other => Err(CryptoError::KeystoreError(format!(
                "unsupported cipher: {}",
                other
            ))),
        }
    }
}

/// Encryption parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeystoreOptions {
    pub kdf: Kdf,
    pub cipher: Cipher,
}

impl KeystoreOptions {
    /// Cheap parameters for tests and low-powered devices.
    pub fn light() -> Self {
        Self {
            kdf: Kdf::Scrypt {
                log_n: 12,
                r: 8,
                p: 1,
            },
            cipher: Cipher::Aes128Ctr,
        }
    }
}

impl Default for KeystoreOptions {
    fn default() -> Self {
        Self {
            kdf: Kdf::Scrypt {
                log_n: 18,
                r: 8,
                p: 1,
            },
            cipher: Cipher::Aes128Ctr,
        }
    }
}

/// Keystore JSON document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeystoreDocument {
    pub version: u32,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: KeystoreCrypto,
    #[serde(
        rename = "x-keyforge",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extension: Option<MnemonicExtension>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum KdfParams {
    Scrypt(ScryptParams),
    Pbkdf2(Pbkdf2Params),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScryptParams {
    pub dklen: usize,
    pub n: u64,
    pub p: u32,
    pub r: u32,
    pub salt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pbkdf2Params {
    pub c: u32,
    pub dklen: usize,
    pub prf: String,
    pub salt: String,
}

/// Encrypted mnemonic entropy and derivation path of an HD wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MnemonicExtension {
    pub mnemonic_ciphertext: String,
    pub mnemonic_counter: String,
    pub mnemonic_mac: String,
    pub path: String,
    pub locale: String,
    pub version: u32,
}

impl KeystoreDocument {
    /// Address recorded in the document, if present and well formed.
    pub fn address(&self) -> Option<Address> {
        self.address.as_deref().and_then(|a| a.parse().ok())
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::KeystoreError(format!("Parse error: {}", e)))
    }

    /// Write the document as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), CryptoError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CryptoError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Encrypt a wallet under `password`.
///
/// Salt, IV, extension counter and document id are drawn from `rng`. A wallet
/// whose seed used a BIP-39 passphrase is stored without its mnemonic, since
/// the passphrase is never persisted.
pub fn encrypt<R: RngCore + CryptoRng>(
    wallet: &Wallet,
    password: &str,
    options: &KeystoreOptions,
    rng: &mut R,
) -> Result<KeystoreDocument, CryptoError> {
    let cipher = options.cipher;
    if let Kdf::Scrypt { log_n, .. } = options.kdf {
        if log_n == 0 || log_n > MAX_SCRYPT_LOG_N {
            return Err(CryptoError::KeystoreError(format!(
                "scrypt log_n must be in 1..={}, got {}",
                MAX_SCRYPT_LOG_N, log_n
            )));
        }
    }
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    tracing::debug!(kdf = options.kdf.name(), cipher = %cipher, "encrypting keystore");

    let kdfparams = match options.kdf {
        Kdf::Scrypt { log_n, r, p } => KdfParams::Scrypt(ScryptParams {
            dklen: cipher.dklen(),
            n: 1u64 << log_n,
            p,
            r,
            salt: hex::encode(salt),
        }),
        Kdf::Pbkdf2 { iterations } => KdfParams::Pbkdf2(Pbkdf2Params {
            c: iterations,
            dklen: cipher.dklen(),
            prf: PBKDF2_PRF.to_string(),
            salt: hex::encode(salt),
        }),
    };
    let derived = derive_key(&kdfparams, password)?;
    let (cipher_key, mac_key) = derived.split_at(cipher.key_len());

    let mut ciphertext = wallet.export_private_key()?.to_vec();
    cipher.apply(cipher_key, &iv, &mut ciphertext)?;
    let mac = keccak256_multi(&[mac_key, &ciphertext]);

    let extension = match wallet.origin() {
        Some(origin) if origin.passphrase_protected() => {
            tracing::warn!(
                address = %wallet.address(),
                "wallet seed uses a passphrase, keystore will hold the derived key only"
            );
            None
        }
        Some(origin) => {
            let mut counter = [0u8; IV_LEN];
            rng.fill_bytes(&mut counter);
            let mut sealed = origin.mnemonic().to_entropy().to_vec();
            cipher.apply(cipher_key, &counter, &mut sealed)?;
            let mnemonic_mac = keccak256_multi(&[mac_key, &sealed]);
            Some(MnemonicExtension {
                mnemonic_ciphertext: hex::encode(&sealed),
                mnemonic_counter: hex::encode(counter),
                mnemonic_mac: mnemonic_mac.to_hex(),
                path: origin.path().to_string(),
                locale: MNEMONIC_LOCALE.to_string(),
                version: EXTENSION_VERSION,
            })
        }
        None => None,
    };

    let mut id = [0u8; 16];
    rng.fill_bytes(&mut id);

    Ok(KeystoreDocument {
        version: KEYSTORE_VERSION,
        id: uuid::Builder::from_random_bytes(id).into_uuid().to_string(),
        address: Some(wallet.address().to_hex()),
        crypto: KeystoreCrypto {
            cipher: cipher.as_str().to_string(),
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams {
                iv: hex::encode(iv),
            },
            kdf: options.kdf.name().to_string(),
            kdfparams,
            mac: mac.to_hex(),
        },
        extension,
    })
}

/// Decrypt a keystore document.
///
/// The MAC is checked before anything is decrypted. A wrong password and a
/// tampered ciphertext both yield [`CryptoError::AuthenticationFailed`].
pub fn decrypt(doc: &KeystoreDocument, password: &str) -> Result<Wallet, CryptoError> {
    if doc.version != KEYSTORE_VERSION {
        return Err(CryptoError::KeystoreError(format!(
            "Unsupported keystore version: {}",
            doc.version
        )));
    }
    let crypto = &doc.crypto;
    let cipher: Cipher = crypto.cipher.parse()?;
    let expected_kdf = match crypto.kdfparams {
        KdfParams::Scrypt(_) => "scrypt",
        KdfParams::Pbkdf2(_) => "pbkdf2",
    };
    if crypto.kdf != expected_kdf {
        return Err(CryptoError::KeystoreError(format!(
            "kdf {} does not match its parameters",
            crypto.kdf
        )));
    }
    if kdf_dklen(&crypto.kdfparams) != cipher.dklen() {
        return Err(CryptoError::KeystoreError(format!(
            "{} needs a {}-byte derived key",
            cipher,
            cipher.dklen()
        )));
    }

    let ciphertext = decode_hex("ciphertext", &crypto.ciphertext)?;
    let iv = decode_hex("iv", &crypto.cipherparams.iv)?;
    let mac = decode_hex("mac", &crypto.mac)?;
    if mac.len() != MAC_LEN {
        return Err(CryptoError::KeystoreError("mac must be 32 bytes".into()));
    }

    tracing::debug!(kdf = %crypto.kdf, cipher = %cipher, "decrypting keystore");
    let derived = derive_key(&crypto.kdfparams, password)?;
    let (cipher_key, mac_key) = derived.split_at(cipher.key_len());
    check_mac(mac_key, &ciphertext, &mac)?;

    let mut key = Zeroizing::new(ciphertext);
    cipher.apply(cipher_key, &iv, &mut key)?;
    if key.len() != PRIVATE_KEY_LEN {
        return Err(CryptoError::KeystoreError(format!(
            "Invalid key length: {}",
            key.len()
        )));
    }
    let mut private_key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    private_key.copy_from_slice(&key);

    let wallet = match &doc.extension {
        Some(ext) => {
            let wallet = restore_hd_wallet(ext, cipher, cipher_key, mac_key)?;
            let restored = wallet.export_private_key()?;
            if !bool::from(restored[..].ct_eq(&private_key[..])) {
                return Err(CryptoError::KeystoreError(
                    "mnemonic extension does not match the stored key".into(),
                ));
            }
            wallet
        }
        None => Wallet::from_private_key(&private_key)?,
    };

    if let Some(recorded) = &doc.address {
        let recorded = Address::from_str(recorded)?;
        if recorded != wallet.address() {
            return Err(CryptoError::KeystoreError(
                "address does not match the stored key".into(),
            ));
        }
    }
    Ok(wallet)
}

/// Check that `path` holds a parseable keystore document.
pub fn check_keystore(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    KeystoreDocument::load(path).is_ok()
}

fn restore_hd_wallet(
    ext: &MnemonicExtension,
    cipher: Cipher,
    cipher_key: &[u8],
    mac_key: &[u8],
) -> Result<Wallet, CryptoError> {
    if ext.version != EXTENSION_VERSION {
        return Err(CryptoError::KeystoreError(format!(
            "Unsupported x-keyforge version: {}",
            ext.version
        )));
    }
    if ext.locale != MNEMONIC_LOCALE {
        return Err(CryptoError::KeystoreError(format!(
            "Unsupported mnemonic locale: {}",
            ext.locale
        )));
    }
    let sealed = decode_hex("mnemonicCiphertext", &ext.mnemonic_ciphertext)?;
    let counter = decode_hex("mnemonicCounter", &ext.mnemonic_counter)?;
    let mac = decode_hex("mnemonicMac", &ext.mnemonic_mac)?;
    check_mac(mac_key, &sealed, &mac)?;

    let mut entropy = Zeroizing::new(sealed);
    cipher.apply(cipher_key, &counter, &mut entropy)?;
    let mnemonic = Mnemonic::from_entropy(&entropy)?;
    let path: DerivationPath = ext.path.parse()?;
    Wallet::from_mnemonic(mnemonic, "", path)
}

fn check_mac(mac_key: &[u8], ciphertext: &[u8], expected: &[u8]) -> Result<(), CryptoError> {
    let computed = keccak256_multi(&[mac_key, ciphertext]);
    if bool::from(computed.as_bytes()[..].ct_eq(expected)) {
        Ok(())
    } else {
        Err(CryptoError::AuthenticationFailed)
    }
}

fn kdf_dklen(params: &KdfParams) -> usize {
    match params {
        KdfParams::Scrypt(p) => p.dklen,
        KdfParams::Pbkdf2(p) => p.dklen,
    }
}

/// Reject work factors that would exhaust memory or CPU before any work is done.
fn check_kdf_cost(params: &KdfParams) -> Result<(), CryptoError> {
    match params {
        KdfParams::Scrypt(p) => {
            if p.n < 2 || !p.n.is_power_of_two() {
                return Err(CryptoError::KeystoreError(
                    "scrypt n must be a power of two".into(),
                ));
            }
            if p.n.trailing_zeros() > u32::from(MAX_SCRYPT_LOG_N) {
                return Err(CryptoError::KeystoreError(format!(
                    "scrypt n above 2^{} is not accepted",
                    MAX_SCRYPT_LOG_N
                )));
            }
            let memory = 128u64
                .checked_mul(u64::from(p.r))
                .and_then(|m| m.checked_mul(p.n));
            if p.r == 0 || memory.map_or(true, |m| m > MAX_SCRYPT_MEMORY) {
                return Err(CryptoError::KeystoreError(format!(
                    "scrypt r = {} with n = {} exceeds the memory limit",
                    p.r, p.n
                )));
            }
            if p.p == 0 || p.p > MAX_SCRYPT_P {
                return Err(CryptoError::KeystoreError(format!(
                    "scrypt p must be in 1..={}, got {}",
                    MAX_SCRYPT_P, p.p
                )));
            }
        }
        KdfParams::Pbkdf2(p) => {
            if p.c == 0 || p.c > MAX_PBKDF2_ITERATIONS {
                return Err(CryptoError::KeystoreError(format!(
                    "pbkdf2 iteration count must be in 1..={}, got {}",
                    MAX_PBKDF2_ITERATIONS, p.c
                )));
            }
        }
    }
    Ok(())
}

fn derive_key(params: &KdfParams, password: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    check_kdf_cost(params)?;
    match params {
        KdfParams::Scrypt(p) => {
            let salt = decode_hex("salt", &p.salt)?;
            let log_n = p.n.trailing_zeros() as u8;
            let params = scrypt::Params::new(log_n, p.r, p.p, p.dklen)
                .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
            let mut out = Zeroizing::new(vec![0u8; p.dklen]);
            scrypt::scrypt(password.as_bytes(), &salt, &params, &mut out)
                .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
            Ok(out)
        }
        KdfParams::Pbkdf2(p) => {
            if p.prf != PBKDF2_PRF {
                return Err(CryptoError::KeystoreError(format!(
                    "unsupported prf: {}",
                    p.prf
                )));
            }
            let salt = decode_hex("salt", &p.salt)?;
            let mut out = Zeroizing::new(vec![0u8; p.dklen]);
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, p.c, &mut out);
            Ok(out)
        }
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| CryptoError::KeystoreError(format!("Invalid {}", field)))
}
