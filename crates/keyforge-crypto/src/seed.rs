use crate::mnemonic::Mnemonic;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use std::fmt;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a BIP-39 seed in bytes
pub const SEED_LEN: usize = 64;

const PBKDF2_ROUNDS: u32 = 2048;
const SALT_PREFIX: &str = "mnemonic";

/// 64-byte BIP-39 seed. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([redacted])")
    }
}

/// Stretch a mnemonic and optional passphrase into a seed.
///
/// PBKDF2-HMAC-SHA512, 2048 rounds, salt `"mnemonic" || NFKD(passphrase)`.
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    let phrase = mnemonic.phrase();
    let mut salt = Zeroizing::new(String::with_capacity(SALT_PREFIX.len() + passphrase.len()));
    salt.push_str(SALT_PREFIX);
    salt.extend(passphrase.nfkd());

    let mut out = [0u8; SEED_LEN];
    pbkdf2_hmac::<Sha512>(phrase.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut out);
    let seed = Seed(out);
    out.zeroize();
    seed
}

impl Mnemonic {
    /// Shorthand for [`mnemonic_to_seed`].
    pub fn to_seed(&self, passphrase: &str) -> Seed {
        mnemonic_to_seed(self, passphrase)
    }
}
