use crate::error::TypesError;
use std::fmt;

/// Offset added to the recovery id for pre-EIP-155 signatures.
pub const LEGACY_V_OFFSET: u64 = 27;
/// Offset added to `chain_id * 2` for EIP-155 signatures.
pub const EIP155_V_OFFSET: u64 = 35;

/// Recoverable secp256k1 ECDSA signature.
///
/// `r` and `s` are 32-byte big-endian scalars; `s` is always in the lower
/// half of the curve order when produced by the signer. The recovery id is
/// the parity of the ephemeral point's y coordinate (0 or 1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    recovery_id: u8,
}

impl Signature {
    pub const LEN: usize = 65;

    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Result<Self, TypesError> {
        if recovery_id > 1 {
            return Err(TypesError::InvalidRecoveryId(recovery_id as u64));
        }
        Ok(Self { r, s, recovery_id })
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// `r || s` without the recovery byte.
    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// 65-byte `r || s || v` form with `v = 27 + recovery_id`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.to_compact());
        out[64] = LEGACY_V_OFFSET as u8 + self.recovery_id;
        out
    }

    /// Parse the 65-byte form. The trailing byte may be a raw recovery id
    /// (0/1) or the legacy `v` (27/28).
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidSignatureLength(slice.len()));
        }
        let recovery_id = match slice[64] {
            0 | 1 => slice[64],
            27 | 28 => slice[64] - 27,
            other => return Err(TypesError::InvalidRecoveryId(other as u64)),
        };
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&slice[..32]);
        s.copy_from_slice(&slice[32..64]);
        Self::new(r, s, recovery_id)
    }

    /// Transaction `v` value for this signature.
    pub fn v(&self, chain_id: Option<u64>) -> Result<u64, TypesError> {
        match chain_id {
            None => Ok(LEGACY_V_OFFSET + self.recovery_id as u64),
            Some(id) => eip155_v(id, self.recovery_id),
        }
    }
}

/// `chain_id * 2 + 35 + recovery_id`, or `FieldOutOfRange` if it overflows u64.
pub fn eip155_v(chain_id: u64, recovery_id: u8) -> Result<u64, TypesError> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(EIP155_V_OFFSET))
        .and_then(|v| v.checked_add(recovery_id as u64))
        .ok_or_else(|| TypesError::FieldOutOfRange {
            field: "chain_id",
            reason: format!("{chain_id} too large for an EIP-155 v value"),
        })
}

/// Split a transaction `v` into the recovery id and the chain id it encodes.
pub fn split_v(v: u64) -> Result<(u8, Option<u64>), TypesError> {
    match v {
        27 | 28 => Ok(((v - LEGACY_V_OFFSET) as u8, None)),
        v if v >= EIP155_V_OFFSET => {
            let body = v - EIP155_V_OFFSET;
            Ok(((body % 2) as u8, Some(body / 2)))
        }
        other => Err(TypesError::InvalidRecoveryId(other)),
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature(r: 0x{}..., s: 0x{}..., rec: {})",
            hex::encode(&self.r[..4]),
            hex::encode(&self.s[..4]),
            self.recovery_id
        )
    }
}

impl fmt::LowerHex for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}
