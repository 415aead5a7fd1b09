//! BIP-39 mnemonic codec.
//!
//! Converts entropy to an English word phrase and back. The word list comes
//! from the `bip39` crate; checksum handling and validation live here so that
//! every failure maps onto [`CryptoError`] without echoing the offending word.

use crate::error::CryptoError;
use crate::hash::sha256;
use bip39::Language;
use rand::{CryptoRng, RngCore};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Accepted phrase lengths
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];
/// Accepted entropy lengths in bytes
pub const VALID_ENTROPY_LENGTHS: [usize; 5] = [16, 20, 24, 28, 32];

const BITS_PER_WORD: usize = 11;

/// A validated mnemonic phrase.
///
/// Holds word indices rather than text. Construction always validates the
/// checksum, so a `Mnemonic` value can be turned back into entropy without
/// failing.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Mnemonic {
    indices: Vec<u16>,
}

impl Mnemonic {
    /// Encode entropy as a phrase.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, CryptoError> {
        entropy_to_mnemonic(entropy)
    }

    /// Parse and validate a phrase. Whitespace runs and letter case are ignored.
    pub fn parse(phrase: &str) -> Result<Self, CryptoError> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if !VALID_WORD_COUNTS.contains(&words.len()) {
            return Err(CryptoError::InvalidWordCount(words.len()));
        }

        let language = Language::English;
        let mut indices = Vec::with_capacity(words.len());
        for (position, word) in words.iter().enumerate() {
            let lower = Zeroizing::new(word.to_lowercase());
            let index = language
                .find_word(&lower)
                .ok_or(CryptoError::InvalidWord { position })?;
            indices.push(index);
        }

        let mnemonic = Self { indices };
        let (entropy, checksum) = mnemonic.split_bits();
        if checksum != checksum_bits(&entropy) {
            return Err(CryptoError::InvalidChecksum);
        }
        Ok(mnemonic)
    }

    /// Generate a phrase with `word_count` words from the given RNG.
    pub fn generate<R: RngCore + CryptoRng>(
        word_count: usize,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        if !VALID_WORD_COUNTS.contains(&word_count) {
            return Err(CryptoError::InvalidWordCount(word_count));
        }
        let mut entropy = Zeroizing::new(vec![0u8; word_count * 4 / 3]);
        rng.fill_bytes(&mut entropy);
        entropy_to_mnemonic(&entropy)
    }

    pub fn word_count(&self) -> usize {
        self.indices.len()
    }

    /// Words in order.
    pub fn words(&self) -> impl Iterator<Item = &'static str> + '_ {
        let list = Language::English.word_list();
        self.indices.iter().map(move |&i| list[i as usize])
    }

    /// Canonical phrase: lowercase words separated by single spaces.
    pub fn phrase(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::with_capacity(self.indices.len() * 9));
        for (i, word) in self.words().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(word);
        }
        out
    }

    /// Recover the entropy this phrase encodes.
    pub fn to_entropy(&self) -> Zeroizing<Vec<u8>> {
        self.split_bits().0
    }

    /// Split the index stream into entropy bytes and the trailing checksum bits.
    fn split_bits(&self) -> (Zeroizing<Vec<u8>>, u8) {
        let total_bits = self.indices.len() * BITS_PER_WORD;
        let checksum_len = total_bits / 33;
        let entropy_len = (total_bits - checksum_len) / 8;

        let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
        let mut checksum = 0u8;
        for bit in 0..total_bits {
            let word = self.indices[bit / BITS_PER_WORD];
            let set = (word >> (BITS_PER_WORD - 1 - bit % BITS_PER_WORD)) & 1 == 1;
            if bit < entropy_len * 8 {
                if set {
                    entropy[bit / 8] |= 0x80 >> (bit % 8);
                }
            } else {
                checksum = (checksum << 1) | set as u8;
            }
        }
        (entropy, checksum)
    }
}

/// The leading `ENT/32` bits of SHA-256(entropy), right-aligned.
fn checksum_bits(entropy: &[u8]) -> u8 {
    let len = entropy.len() / 4;
    sha256(entropy)[0] >> (8 - len)
}

/// Encode entropy of 16, 20, 24, 28 or 32 bytes as a mnemonic.
pub fn entropy_to_mnemonic(entropy: &[u8]) -> Result<Mnemonic, CryptoError> {
    if !VALID_ENTROPY_LENGTHS.contains(&entropy.len()) {
        return Err(CryptoError::InvalidEntropyLength(entropy.len()));
    }

    let checksum_len = entropy.len() / 4;
    let checksum = sha256(entropy)[0];
    let total_bits = entropy.len() * 8 + checksum_len;

    let bit_at = |i: usize| -> u16 {
        let byte = if i < entropy.len() * 8 {
            entropy[i / 8]
        } else {
            checksum
        };
        ((byte >> (7 - i % 8)) & 1) as u16
    };

    let indices = (0..total_bits / BITS_PER_WORD)
        .map(|w| {
            (0..BITS_PER_WORD).fold(0u16, |acc, b| (acc << 1) | bit_at(w * BITS_PER_WORD + b))
        })
        .collect();

    Ok(Mnemonic { indices })
}

/// Decode a mnemonic back into its entropy.
pub fn mnemonic_to_entropy(mnemonic: &Mnemonic) -> Zeroizing<Vec<u8>> {
    mnemonic.to_entropy()
}

impl FromStr for Mnemonic {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.indices.len())
            .finish_non_exhaustive()
    }
}
