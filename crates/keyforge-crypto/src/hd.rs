//! BIP-32 hierarchical deterministic key tree over secp256k1.
//!
//! An [`HDNode`] is immutable: every derivation returns a fresh node. Nodes
//! with a private key can derive both hardened and normal children; neutered
//! (public-only) nodes can derive normal children only.

use crate::error::CryptoError;
use crate::hash::{hash160, hmac_sha512, sha256d};
use crate::seed::Seed;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, FieldBytes, ProjectivePoint, PublicKey, Scalar, SecretKey};
use keyforge_types::Address;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Bit that marks a child index as hardened.
pub const HARDENED_BIT: u32 = 1 << 31;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
const XPRV_VERSION: [u8; 4] = [0x04, 0x88, 0xad, 0xe4];
const XPUB_VERSION: [u8; 4] = [0x04, 0x88, 0xb2, 0x1e];
const EXTENDED_KEY_LEN: usize = 78;

/// BIP-44 purpose level.
pub const BIP44_PURPOSE: u32 = 44;
/// SLIP-44 coin type for Ether.
pub const ETHEREUM_COIN_TYPE: u32 = 60;

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildNumber {
    Normal(u32),
    Hardened(u32),
}

impl ChildNumber {
    pub fn normal(index: u32) -> Result<Self, CryptoError> {
        check_index(index)?;
        Ok(ChildNumber::Normal(index))
    }

    pub fn hardened(index: u32) -> Result<Self, CryptoError> {
        check_index(index)?;
        Ok(ChildNumber::Hardened(index))
    }

    /// Interpret a raw 32-bit child number (hardened bit included).
    pub fn from_raw(raw: u32) -> Self {
        if raw & HARDENED_BIT != 0 {
            ChildNumber::Hardened(raw & !HARDENED_BIT)
        } else {
            ChildNumber::Normal(raw)
        }
    }

    /// Raw 32-bit form, hardened bit included.
    pub fn to_raw(self) -> u32 {
        match self {
            ChildNumber::Normal(i) => i,
            ChildNumber::Hardened(i) => i | HARDENED_BIT,
        }
    }

    /// Index without the hardened bit.
    pub fn index(self) -> u32 {
        match self {
            ChildNumber::Normal(i) | ChildNumber::Hardened(i) => i,
        }
    }

    pub fn is_hardened(self) -> bool {
        matches!(self, ChildNumber::Hardened(_))
    }

    /// Same kind, next index. `None` once the 31-bit space is used up.
    pub fn next(self) -> Option<Self> {
        let next = self.index().checked_add(1).filter(|i| *i < HARDENED_BIT)?;
        Some(match self {
            ChildNumber::Normal(_) => ChildNumber::Normal(next),
            ChildNumber::Hardened(_) => ChildNumber::Hardened(next),
        })
    }
}

fn check_index(index: u32) -> Result<(), CryptoError> {
    if index >= HARDENED_BIT {
        return Err(CryptoError::InvalidPathSyntax(format!(
            "index {index} is not below 2^31"
        )));
    }
    Ok(())
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildNumber::Normal(i) => write!(f, "{i}"),
            ChildNumber::Hardened(i) => write!(f, "{i}'"),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix('\'') {
            Some(d) => (d, true),
            None => (s, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CryptoError::InvalidPathSyntax(format!(
                "segment '{s}' is not a decimal index"
            )));
        }
        let index: u32 = digits.parse().map_err(|_| {
            CryptoError::InvalidPathSyntax(format!("segment '{s}' overflows 32 bits"))
        })?;
        if hardened {
            ChildNumber::hardened(index)
        } else {
            ChildNumber::normal(index)
        }
    }
}

/// Ordered list of child numbers, written `m/44'/60'/0'/0/0`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The empty path `m`.
    pub fn master() -> Self {
        Self(Vec::new())
    }

    /// `m/purpose'/coin'/account'/change/index` with purpose 44.
    pub fn bip44(coin: u32, account: u32, change: u32, index: u32) -> Result<Self, CryptoError> {
        Ok(Self(vec![
            ChildNumber::hardened(BIP44_PURPOSE)?,
            ChildNumber::hardened(coin)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(change)?,
            ChildNumber::normal(index)?,
        ]))
    }

    /// Default Ethereum account path `m/44'/60'/0'/0/{index}`.
    pub fn ethereum(index: u32) -> Result<Self, CryptoError> {
        Self::bip44(ETHEREUM_COIN_TYPE, 0, 0, index)
    }

    /// This path extended by one step.
    pub fn child(&self, child: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(child);
        Self(steps)
    }

    /// This path without its last step, or `None` for `m`.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// True when every step can be derived from a public key alone.
    pub fn is_hardened_free(&self) -> bool {
        self.0.iter().all(|c| !c.is_hardened())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildNumber> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in &self.0 {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = CryptoError;

    /// Grammar: `m(/\d+'?)*`, every index below 2^31.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('m').ok_or_else(|| {
            CryptoError::InvalidPathSyntax("path must start with 'm'".to_string())
        })?;
        if rest.is_empty() {
            return Ok(Self::master());
        }
        let rest = rest.strip_prefix('/').ok_or_else(|| {
            CryptoError::InvalidPathSyntax("expected '/' after 'm'".to_string())
        })?;
        rest.split('/')
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// A node of the key tree.
#[derive(Clone, PartialEq, Eq)]
pub struct HDNode {
    secret: Option<SecretKey>,
    public: PublicKey,
    chain_code: Zeroizing<[u8; 32]>,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
}

impl HDNode {
    /// Master node for a BIP-39 seed.
    pub fn from_seed(seed: &Seed) -> Result<Self, CryptoError> {
        Self::from_seed_bytes(seed.as_bytes())
    }

    /// Master node for raw seed bytes (16 to 64 bytes).
    pub fn from_seed_bytes(seed: &[u8]) -> Result<Self, CryptoError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(CryptoError::InvalidSeedLength(seed.len()));
        }
        let i = hmac_sha512(MASTER_HMAC_KEY, seed)?;
        let (il, ir) = split_hmac(&i);
        let secret = scalar_from_il(&il)
            .and_then(|k| SecretKey::from_bytes(&k.to_repr()).ok())
            .ok_or(CryptoError::InvalidMasterKey)?;

        tracing::debug!("derived master node");
        Ok(Self {
            public: secret.public_key(),
            secret: Some(secret),
            chain_code: ir,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: ChildNumber::Normal(0),
        })
    }

    /// Root node for a lone private key (zero chain code).
    pub fn from_private_key(key: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_bytes(&FieldBytes::clone_from_slice(key))
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self {
            public: secret.public_key(),
            secret: Some(secret),
            chain_code: Zeroizing::new([0u8; 32]),
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: ChildNumber::Normal(0),
        })
    }

    /// Derive one child.
    ///
    /// Returns `InvalidDerivedKey` when IL is not below the curve order or
    /// the resulting key is zero (point at infinity for public-only nodes).
    /// The caller should then move on to the next index, see
    /// [`HDNode::derive_next_valid_child`].
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, CryptoError> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or(CryptoError::MaxDepthExceeded)?;

        let mut data = Zeroizing::new(Vec::with_capacity(37));
        match (child, &self.secret) {
            (ChildNumber::Hardened(index), None) => {
                return Err(CryptoError::HardenedDerivationRequiresPrivateKey { index })
            }
            (ChildNumber::Hardened(_), Some(secret)) => {
                let key = Zeroizing::new(secret.to_bytes());
                data.push(0);
                data.extend_from_slice(&key);
            }
            (ChildNumber::Normal(_), _) => data.extend_from_slice(&self.public_key_bytes()),
        }
        data.extend_from_slice(&child.to_raw().to_be_bytes());

        let i = hmac_sha512(&self.chain_code[..], &data)?;
        let (il, ir) = split_hmac(&i);
        self.child_from_il(child, depth, &il, ir)
    }

    /// Apply the HMAC output halves for `child`: IL tweaks the key, IR
    /// becomes the chain code.
    fn child_from_il(
        &self,
        child: ChildNumber,
        depth: u8,
        il: &[u8; 32],
        chain_code: Zeroizing<[u8; 32]>,
    ) -> Result<Self, CryptoError> {
        let invalid = CryptoError::InvalidDerivedKey {
            index: child.to_raw(),
        };

        let (secret, public) = match &self.secret {
            Some(parent) => {
                let secret = tweak_secret(parent, il).ok_or(invalid)?;
                let public = secret.public_key();
                (Some(secret), public)
            }
            None => (None, tweak_public(&self.public, il).ok_or(invalid)?),
        };

        tracing::trace!(depth, child = %child, "derived child node");
        Ok(Self {
            secret,
            public,
            chain_code,
            depth,
            parent_fingerprint: self.fingerprint(),
            child_number: child,
        })
    }

    /// [`HDNode::derive_child`] taking a plain index and a hardened flag.
    pub fn derive_child_index(&self, index: u32, hardened: bool) -> Result<Self, CryptoError> {
        let child = if hardened {
            ChildNumber::hardened(index)?
        } else {
            ChildNumber::normal(index)?
        };
        self.derive_child(child)
    }

    /// Derive the first valid child at or after `index`, skipping indices
    /// that yield an invalid key.
    pub fn derive_next_valid_child(&self, index: u32, hardened: bool) -> Result<Self, CryptoError> {
        let start = if hardened {
            ChildNumber::hardened(index)?
        } else {
            ChildNumber::normal(index)?
        };
        next_valid_child(start, |c| self.derive_child(c))
    }

    /// Fold [`HDNode::derive_child`] over `path`.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, CryptoError> {
        let node = path
            .iter()
            .enumerate()
            .try_fold(self.clone(), |node, (segment, child)| {
                node.derive_child(*child).map_err(|e| match e {
                    CryptoError::HardenedDerivationRequiresPrivateKey { index } => {
                        CryptoError::PathAppliesHardenedToPublicOnlyNode { segment, index }
                    }
                    other => other,
                })
            })?;
        tracing::debug!(path = %path, depth = node.depth, "derived path");
        Ok(node)
    }

    /// Public-only copy of this node.
    pub fn neuter(&self) -> Self {
        Self {
            secret: None,
            ..self.clone()
        }
    }

    pub fn has_private_key(&self) -> bool {
        self.secret.is_some()
    }

    pub fn private_key_bytes(&self) -> Option<Zeroizing<[u8; 32]>> {
        self.secret.as_ref().map(|s| {
            let bytes = Zeroizing::new(s.to_bytes());
            let mut out = Zeroizing::new([0u8; 32]);
            out.copy_from_slice(&bytes);
            out
        })
    }

    pub(crate) fn secret_key(&self) -> Option<&SecretKey> {
        self.secret.as_ref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// SEC1 compressed public key.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out.copy_from_slice(self.public.to_encoded_point(true).as_bytes());
        out
    }

    /// SEC1 uncompressed public key without the `0x04` tag.
    pub fn uncompressed_public_key(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out.copy_from_slice(&self.public.to_encoded_point(false).as_bytes()[1..]);
        out
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }

    /// HASH160 of the compressed public key.
    pub fn identifier(&self) -> [u8; 20] {
        hash160(&self.public_key_bytes())
    }

    /// First four bytes of [`HDNode::identifier`].
    pub fn fingerprint(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.identifier()[..4]);
        out
    }

    /// Account address: last 20 bytes of Keccak-256 of the uncompressed key.
    pub fn address(&self) -> Address {
        Address::from_uncompressed_public_key(&self.uncompressed_public_key())
    }

    /// Base58Check `xprv` serialization.
    pub fn to_xprv(&self) -> Result<Zeroizing<String>, CryptoError> {
        let secret = self.secret.as_ref().ok_or(CryptoError::NoPrivateKey)?;
        let bytes = Zeroizing::new(secret.to_bytes());
        let mut key = Zeroizing::new([0u8; 33]);
        key[1..].copy_from_slice(&bytes);
        Ok(Zeroizing::new(self.encode_extended(XPRV_VERSION, &key)))
    }

    /// Base58Check `xpub` serialization.
    pub fn to_xpub(&self) -> String {
        self.encode_extended(XPUB_VERSION, &self.public_key_bytes())
    }

    fn encode_extended(&self, version: [u8; 4], key: &[u8; 33]) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(EXTENDED_KEY_LEN + 4));
        payload.extend_from_slice(&version);
        payload.push(self.depth);
        payload.extend_from_slice(&self.parent_fingerprint);
        payload.extend_from_slice(&self.child_number.to_raw().to_be_bytes());
        payload.extend_from_slice(&self.chain_code[..]);
        payload.extend_from_slice(key);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(payload.as_slice()).into_string()
    }

    /// Parse an `xprv` or `xpub` string.
    pub fn from_extended_key(s: &str) -> Result<Self, CryptoError> {
        let invalid = |reason: &str| CryptoError::InvalidExtendedKey(reason.to_string());

        let data = Zeroizing::new(
            bs58::decode(s)
                .into_vec()
                .map_err(|_| invalid("not valid base58"))?,
        );
        if data.len() != EXTENDED_KEY_LEN + 4 {
            return Err(invalid("wrong length"));
        }
        let (payload, checksum) = data.split_at(EXTENDED_KEY_LEN);
        if sha256d(payload)[..4] != *checksum {
            return Err(invalid("checksum mismatch"));
        }

        let version = &payload[0..4];
        let depth = payload[4];
        let mut parent_fingerprint = [0u8; 4];
        parent_fingerprint.copy_from_slice(&payload[5..9]);
        let mut raw_child = [0u8; 4];
        raw_child.copy_from_slice(&payload[9..13]);
        let child_number = ChildNumber::from_raw(u32::from_be_bytes(raw_child));
        let mut chain_code = Zeroizing::new([0u8; 32]);
        chain_code.copy_from_slice(&payload[13..45]);
        let key = &payload[45..78];

        if depth == 0 && (parent_fingerprint != [0u8; 4] || child_number.to_raw() != 0) {
            return Err(invalid("master key with non-zero parent or index"));
        }

        let (secret, public) = if version == XPRV_VERSION {
            if key[0] != 0 {
                return Err(invalid("private key must be prefixed with 0x00"));
            }
            let secret = SecretKey::from_bytes(FieldBytes::from_slice(&key[1..]))
                .map_err(|_| invalid("private key out of range"))?;
            let public = secret.public_key();
            (Some(secret), public)
        } else if version == XPUB_VERSION {
            let public = PublicKey::from_sec1_bytes(key)
                .map_err(|_| invalid("public key is not on the curve"))?;
            if !matches!(key[0], 0x02 | 0x03) {
                return Err(invalid("public key must be compressed"));
            }
            (None, public)
        } else {
            return Err(invalid("unknown version bytes"));
        };

        Ok(Self {
            secret,
            public,
            chain_code,
            depth,
            parent_fingerprint,
            child_number,
        })
    }
}

impl fmt::Debug for HDNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HDNode")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

fn split_hmac(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut il = Zeroizing::new([0u8; 32]);
    let mut ir = Zeroizing::new([0u8; 32]);
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ir)
}

/// IL as a scalar, or `None` when it is not below the curve order.
fn scalar_from_il(il: &[u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(il)))
}

/// `IL + k mod n`, `None` if IL >= n or the sum is zero.
fn tweak_secret(parent: &SecretKey, il: &[u8; 32]) -> Option<SecretKey> {
    let tweak = scalar_from_il(il)?;
    let child = tweak + *parent.to_nonzero_scalar();
    SecretKey::from_bytes(&child.to_repr()).ok()
}

/// `IL*G + K`, `None` if IL >= n or the sum is the point at infinity.
fn tweak_public(parent: &PublicKey, il: &[u8; 32]) -> Option<PublicKey> {
    let tweak = scalar_from_il(il)?;
    let point = ProjectivePoint::GENERATOR * tweak + parent.to_projective();
    PublicKey::from_affine(AffinePoint::from(point)).ok()
}

/// Walk forward from `start` until `derive` yields something other than a
/// retryable error.
fn next_valid_child<F>(start: ChildNumber, mut derive: F) -> Result<HDNode, CryptoError>
where
    F: FnMut(ChildNumber) -> Result<HDNode, CryptoError>,
{
    let mut child = start;
    loop {
        match derive(child) {
            Err(e) if e.is_retryable() => {
                tracing::debug!(child = %child, "invalid derived key, trying next index");
                child = child
                    .next()
                    .ok_or(CryptoError::ChildIndexExhausted(child.to_raw()))?;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::Mnemonic;
    use proptest::prelude::*;

    // secp256k1 group order
    const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    fn tv1_master() -> HDNode {
        HDNode::from_seed_bytes(&hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()).unwrap()
    }

    fn golden_root() -> HDNode {
        let mnemonic = Mnemonic::parse(
            "upset fuel enhance depart portion hope core animal innocent will athlete snack",
        )
        .unwrap();
        HDNode::from_seed(&mnemonic.to_seed("")).unwrap()
    }

    fn bytes32(hex_str: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut out).unwrap();
        out
    }

    /// n - k as big-endian bytes.
    fn order_minus(key: &[u8; 32]) -> [u8; 32] {
        let n = bytes32(CURVE_ORDER);
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut d = n[i] as i16 - key[i] as i16 - borrow;
            borrow = 0;
            if d < 0 {
                d += 256;
                borrow = 1;
            }
            out[i] = d as u8;
        }
        out
    }

    #[test]
    fn test_bip32_vector_1_master() {
        let m = tv1_master();
        assert_eq!(
            hex::encode(m.private_key_bytes().unwrap().as_slice()),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            hex::encode(m.chain_code()),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(hex::encode(m.fingerprint()), "3442193e");
        assert_eq!(
            m.to_xprv().unwrap().as_str(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            m.to_xpub(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn test_bip32_vector_1_children() {
        let m = tv1_master();
        let m0h = m.derive_path(&"m/0'".parse().unwrap()).unwrap();
        assert_eq!(
            hex::encode(m0h.private_key_bytes().unwrap().as_slice()),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
        assert_eq!(
            m0h.to_xpub(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
        assert_eq!(m0h.parent_fingerprint(), m.fingerprint());
        assert_eq!(m0h.depth(), 1);

        let m0h1 = m0h.derive_child_index(1, false).unwrap();
        assert_eq!(
            hex::encode(m0h1.private_key_bytes().unwrap().as_slice()),
            "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
        );
        assert_eq!(
            hex::encode(m0h1.chain_code()),
            "2a7857631386ba23dacac34180dd1983734e444fdbf774041578e9b6adb37c19"
        );
        assert_eq!(
            hex::encode(m0h1.public_key_bytes()),
            "03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c"
        );

        // Public-only derivation reaches the same key.
        let public_child = m0h.neuter().derive_child_index(1, false).unwrap();
        assert_eq!(public_child.public_key_bytes(), m0h1.public_key_bytes());
        assert_eq!(public_child.chain_code(), m0h1.chain_code());
        assert!(!public_child.has_private_key());
    }

    #[test]
    fn test_golden_root_and_account_key() {
        let root = golden_root();
        assert_eq!(
            hex::encode(root.public_key_bytes()),
            "037018b3b6d7a946d838e15fd3723a847401a263b13ec40d5b3cd8e4a4c6a20af2"
        );
        assert_eq!(
            hex::encode(root.chain_code()),
            "117381d1bdc3f788ec0da2157cc4b63a029450786738621c7c1aa6563e9402dd"
        );
        assert_eq!(hex::encode(root.fingerprint()), "1cae751f");

        let account = root.derive_path(&DerivationPath::ethereum(0).unwrap()).unwrap();
        assert_eq!(
            hex::encode(account.private_key_bytes().unwrap().as_slice()),
            "f0858a4efb32ae920092378f82ddefda93e10d1bdb5b4a538887836a8dc80cf3"
        );
        assert_eq!(
            account.address().to_string(),
            "0xfDd85780CB96f4712a869aB4d04f9D80c3CeE283"
        );
    }

    #[test]
    fn test_path_parsing() {
        let path: DerivationPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert_eq!(path, DerivationPath::ethereum(0).unwrap());
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/0");
        assert_eq!(path.len(), 5);
        assert!(!path.is_hardened_free());

        assert_eq!("m".parse::<DerivationPath>().unwrap(), DerivationPath::master());
        assert!("m/0/1/2".parse::<DerivationPath>().unwrap().is_hardened_free());

        let top = format!("m/{}'", HARDENED_BIT - 1);
        assert!(top.parse::<DerivationPath>().is_ok());
    }

    #[test]
    fn test_path_parsing_rejects_bad_syntax() {
        for bad in [
            "",
            "44'/60'",
            "m/",
            "m//0",
            "m/0/",
            "m/a",
            "m/0''",
            "m/-1",
            "m/+1",
            "m/ 1",
            "m/0h",
            "M/0",
            "m0",
            "m/2147483648",
            "m/4294967296'",
        ] {
            assert!(
                matches!(bad.parse::<DerivationPath>(), Err(CryptoError::InvalidPathSyntax(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_path_helpers() {
        let path = DerivationPath::ethereum(3).unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "m/44'/60'/0'/0");
        assert_eq!(parent.child(ChildNumber::Normal(3)), path);
        assert_eq!(DerivationPath::master().parent(), None);
        assert!(DerivationPath::bip44(60, HARDENED_BIT, 0, 0).is_err());
    }

    #[test]
    fn test_child_number_raw() {
        assert_eq!(ChildNumber::Hardened(0).to_raw(), 0x8000_0000);
        assert_eq!(ChildNumber::from_raw(0x8000_0002), ChildNumber::Hardened(2));
        assert_eq!(ChildNumber::from_raw(5), ChildNumber::Normal(5));
        assert_eq!(ChildNumber::Normal(HARDENED_BIT - 1).next(), None);
        assert_eq!(ChildNumber::Hardened(4).next(), Some(ChildNumber::Hardened(5)));
        assert!(ChildNumber::normal(HARDENED_BIT).is_err());
    }

    #[test]
    fn test_hardened_requires_private_key() {
        let public = tv1_master().neuter();
        assert_eq!(
            public.derive_child(ChildNumber::Hardened(0)).unwrap_err(),
            CryptoError::HardenedDerivationRequiresPrivateKey { index: 0 }
        );
        assert_eq!(
            public
                .derive_path(&"m/0/1'/2".parse().unwrap())
                .unwrap_err(),
            CryptoError::PathAppliesHardenedToPublicOnlyNode { segment: 1, index: 1 }
        );
    }

    #[test]
    fn test_hardened_and_normal_children_differ() {
        let root = golden_root();
        let normal = root.derive_child(ChildNumber::Normal(7)).unwrap();
        let hardened = root.derive_child(ChildNumber::Hardened(7)).unwrap();
        assert_ne!(normal.public_key_bytes(), hardened.public_key_bytes());
        assert_ne!(normal.chain_code(), hardened.chain_code());
    }

    #[test]
    fn test_il_at_curve_order_is_invalid() {
        let n = bytes32(CURVE_ORDER);
        assert!(scalar_from_il(&n).is_none());
        assert!(scalar_from_il(&[0xff; 32]).is_none());

        let root = tv1_master();
        let secret = root.secret_key().unwrap();
        assert!(tweak_secret(secret, &n).is_none());
        assert!(tweak_public(root.public_key(), &n).is_none());
    }

    #[test]
    fn test_zero_child_key_is_invalid() {
        let root = tv1_master();
        let k = root.private_key_bytes().unwrap();
        let il = order_minus(&k);

        // IL + k == n == 0 mod n
        assert!(tweak_secret(root.secret_key().unwrap(), &il).is_none());
        // IL*G + K == point at infinity
        assert!(tweak_public(root.public_key(), &il).is_none());

        // A neighbouring tweak is fine.
        let mut ok = il;
        ok[31] ^= 1;
        assert!(tweak_secret(root.secret_key().unwrap(), &ok).is_some());
        assert!(tweak_public(root.public_key(), &ok).is_some());
    }

    #[test]
    fn test_bad_il_reports_child_index() {
        let root = tv1_master();
        let public_root = root.neuter();
        let n = bytes32(CURVE_ORDER);
        let chain_code = || Zeroizing::new([7u8; 32]);

        for child in [ChildNumber::Normal(5), ChildNumber::Hardened(5)] {
            let err = root.child_from_il(child, 1, &n, chain_code()).unwrap_err();
            assert_eq!(err, CryptoError::InvalidDerivedKey { index: child.to_raw() });
            assert!(err.is_retryable());
        }
        assert_eq!(
            root.child_from_il(ChildNumber::Hardened(5), 1, &n, chain_code()),
            Err(CryptoError::InvalidDerivedKey { index: 0x8000_0005 })
        );

        let err = public_root
            .child_from_il(ChildNumber::Normal(9), 1, &n, chain_code())
            .unwrap_err();
        assert_eq!(err, CryptoError::InvalidDerivedKey { index: 9 });

        // IL that cancels the parent key
        let k = root.private_key_bytes().unwrap();
        let il = order_minus(&k);
        assert_eq!(
            root.child_from_il(ChildNumber::Normal(3), 1, &il, chain_code()),
            Err(CryptoError::InvalidDerivedKey { index: 3 })
        );
        assert_eq!(
            public_root.child_from_il(ChildNumber::Normal(3), 1, &il, chain_code()),
            Err(CryptoError::InvalidDerivedKey { index: 3 })
        );

        let child = root
            .child_from_il(ChildNumber::Normal(3), 1, &bytes32(&"01".repeat(32)), chain_code())
            .unwrap();
        assert_eq!(child.child_number(), ChildNumber::Normal(3));
        assert_eq!(child.chain_code(), &[7u8; 32]);
    }

    #[test]
    fn test_next_valid_child_skips_invalid_indices() {
        let root = tv1_master();
        let mut attempts = Vec::new();
        let node = next_valid_child(ChildNumber::Normal(5), |c| {
            attempts.push(c);
            if c.index() < 7 {
                Err(CryptoError::InvalidDerivedKey { index: c.to_raw() })
            } else {
                root.derive_child(c)
            }
        })
        .unwrap();
        assert_eq!(
            attempts,
            vec![ChildNumber::Normal(5), ChildNumber::Normal(6), ChildNumber::Normal(7)]
        );
        assert_eq!(node.child_number(), ChildNumber::Normal(7));
        assert_eq!(node, root.derive_child(ChildNumber::Normal(7)).unwrap());
    }

    #[test]
    fn test_next_valid_child_stops_on_other_errors() {
        let mut calls = 0;
        let err = next_valid_child(ChildNumber::Hardened(0), |_| {
            calls += 1;
            Err(CryptoError::NoPrivateKey)
        })
        .unwrap_err();
        assert_eq!(err, CryptoError::NoPrivateKey);
        assert_eq!(calls, 1);

        let err = next_valid_child(ChildNumber::Normal(HARDENED_BIT - 1), |c| {
            Err(CryptoError::InvalidDerivedKey { index: c.to_raw() })
        })
        .unwrap_err();
        assert_eq!(err, CryptoError::ChildIndexExhausted(HARDENED_BIT - 1));
    }

    #[test]
    fn test_derive_next_valid_child_on_valid_index() {
        let root = tv1_master();
        assert_eq!(
            root.derive_next_valid_child(3, true).unwrap(),
            root.derive_child(ChildNumber::Hardened(3)).unwrap()
        );
    }

    #[test]
    fn test_extended_key_roundtrip() {
        let node = tv1_master().derive_path(&"m/0'/1".parse().unwrap()).unwrap();
        let xprv = node.to_xprv().unwrap();
        assert_eq!(HDNode::from_extended_key(&xprv).unwrap(), node);

        let xpub = node.to_xpub();
        let parsed = HDNode::from_extended_key(&xpub).unwrap();
        assert_eq!(parsed, node.neuter());
        assert!(parsed.to_xprv().is_err());
    }

    #[test]
    fn test_extended_key_rejects_corruption() {
        let xpub = tv1_master().to_xpub();
        let mut chars: Vec<char> = xpub.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '1' { '2' } else { '1' };
        let corrupted: String = chars.into_iter().collect();
        assert!(matches!(
            HDNode::from_extended_key(&corrupted),
            Err(CryptoError::InvalidExtendedKey(_))
        ));
        assert!(HDNode::from_extended_key("xpub").is_err());
        assert!(HDNode::from_extended_key("0OIl").is_err());
    }

    #[test]
    fn test_seed_length_bounds() {
        assert_eq!(
            HDNode::from_seed_bytes(&[0u8; 15]).unwrap_err(),
            CryptoError::InvalidSeedLength(15)
        );
        assert!(HDNode::from_seed_bytes(&[1u8; 64]).is_ok());
        assert!(HDNode::from_seed_bytes(&[1u8; 65]).is_err());
    }

    #[test]
    fn test_from_private_key() {
        let key = bytes32("f0858a4efb32ae920092378f82ddefda93e10d1bdb5b4a538887836a8dc80cf3");
        let node = HDNode::from_private_key(&key).unwrap();
        assert_eq!(
            node.address().to_string(),
            "0xfDd85780CB96f4712a869aB4d04f9D80c3CeE283"
        );
        assert_eq!(
            HDNode::from_private_key(&[0u8; 32]).unwrap_err(),
            CryptoError::InvalidPrivateKey
        );
    }

    #[test]
    fn test_debug_hides_private_key() {
        let node = tv1_master();
        let shown = format!("{:?}", node);
        assert!(!shown.contains("e8f32e72"));
        assert!(shown.contains("has_private_key: true"));
    }

    fn normal_path() -> impl Strategy<Value = DerivationPath> {
        proptest::collection::vec(0u32..HARDENED_BIT, 0..4)
            .prop_map(|v| DerivationPath::from(v.into_iter().map(ChildNumber::Normal).collect::<Vec<_>>()))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn derivation_is_deterministic(path in normal_path(), hardened in any::<bool>(), idx in 0u32..1000) {
            let root = tv1_master();
            let path = if hardened { path.child(ChildNumber::Hardened(idx)) } else { path };
            prop_assert_eq!(root.derive_path(&path).unwrap(), root.derive_path(&path).unwrap());
        }

        #[test]
        fn neutered_derivation_matches(path in normal_path()) {
            let root = tv1_master();
            let private_then_neuter = root.derive_path(&path).unwrap().neuter();
            let neuter_then_public = root.neuter().derive_path(&path).unwrap();
            prop_assert_eq!(private_then_neuter, neuter_then_public);
        }

        #[test]
        fn path_application_is_associative(a in normal_path(), b in normal_path()) {
            let root = tv1_master();
            let joined: DerivationPath = a.iter().chain(b.iter()).copied().collect::<Vec<_>>().into();
            let stepwise = root.derive_path(&a).unwrap().derive_path(&b).unwrap();
            prop_assert_eq!(root.derive_path(&joined).unwrap(), stepwise);
        }

        #[test]
        fn path_display_roundtrip(path in normal_path(), hardened in any::<bool>()) {
            let path = if hardened { path.child(ChildNumber::Hardened(0)) } else { path };
            prop_assert_eq!(path.to_string().parse::<DerivationPath>().unwrap(), path);
        }
    }
}
