//! Recursive Length Prefix encoding.
//!
//! Only the subset needed for legacy transactions: byte strings, unsigned
//! integers in minimal big-endian form, and (nested) lists. The decoder is
//! strict and rejects every non-canonical form, so that a decoded payload
//! re-encodes to exactly the bytes it came from.

use crate::error::TypesError;

const STRING_OFFSET: u8 = 0x80;
const LIST_OFFSET: u8 = 0xc0;
const SHORT_LIMIT: usize = 55;
/// Deepest list nesting the decoder accepts.
pub const MAX_DEPTH: usize = 16;

/// Builder for an RLP list.
#[derive(Debug, Default, Clone)]
pub struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        encode_bytes(&mut self.payload, bytes);
        self
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.append_bytes(trim_leading_zeros(&value.to_be_bytes()))
    }

    pub fn append_u128(&mut self, value: u128) -> &mut Self {
        self.append_bytes(trim_leading_zeros(&value.to_be_bytes()))
    }

    /// Append a 32-byte big-endian scalar as an integer (leading zeros stripped).
    pub fn append_scalar(&mut self, value: &[u8; 32]) -> &mut Self {
        self.append_bytes(trim_leading_zeros(value))
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 9);
        encode_header(&mut out, LIST_OFFSET, self.payload.len());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Encode a byte string into `out`.
pub fn encode_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.len() == 1 && bytes[0] < STRING_OFFSET {
        out.push(bytes[0]);
    } else {
        encode_header(out, STRING_OFFSET, bytes.len());
        out.extend_from_slice(bytes);
    }
}

fn encode_header(out: &mut Vec<u8>, offset: u8, len: usize) {
    if len <= SHORT_LIMIT {
        out.push(offset + len as u8);
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        out.push(offset + SHORT_LIMIT as u8 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// A decoded RLP item borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem<'a> {
    Bytes(&'a [u8]),
    List(Vec<RlpItem<'a>>),
}

impl<'a> RlpItem<'a> {
    pub fn as_bytes(&self, field: &'static str) -> Result<&'a [u8], TypesError> {
        match self {
            RlpItem::Bytes(b) => Ok(b),
            RlpItem::List(_) => Err(TypesError::Rlp(format!("{field}: expected string, got list"))),
        }
    }

    pub fn as_list(&self, field: &'static str) -> Result<&[RlpItem<'a>], TypesError> {
        match self {
            RlpItem::List(items) => Ok(items),
            RlpItem::Bytes(_) => Err(TypesError::Rlp(format!("{field}: expected list, got string"))),
        }
    }

    pub fn as_u64(&self, field: &'static str) -> Result<u64, TypesError> {
        let bytes = self.as_integer_bytes(field, 8)?;
        let mut buf = [0u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn as_u128(&self, field: &'static str) -> Result<u128, TypesError> {
        let bytes = self.as_integer_bytes(field, 16)?;
        let mut buf = [0u8; 16];
        buf[16 - bytes.len()..].copy_from_slice(bytes);
        Ok(u128::from_be_bytes(buf))
    }

    /// Integer as a left-padded 32-byte big-endian value.
    pub fn as_scalar(&self, field: &'static str) -> Result<[u8; 32], TypesError> {
        let bytes = self.as_integer_bytes(field, 32)?;
        let mut buf = [0u8; 32];
        buf[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(buf)
    }

    fn as_integer_bytes(&self, field: &'static str, width: usize) -> Result<&'a [u8], TypesError> {
        let bytes = self.as_bytes(field)?;
        if bytes.first() == Some(&0) {
            return Err(TypesError::Rlp(format!("{field}: integer has leading zero")));
        }
        if bytes.len() > width {
            return Err(TypesError::FieldOutOfRange {
                field,
                reason: format!("{} bytes exceeds {width}-byte width", bytes.len()),
            });
        }
        Ok(bytes)
    }
}

/// Decode exactly one item spanning the whole input.
pub fn decode(input: &[u8]) -> Result<RlpItem<'_>, TypesError> {
    let (item, consumed) = decode_item(input, 0)?;
    if consumed != input.len() {
        return Err(TypesError::Rlp(format!(
            "{} trailing bytes after item",
            input.len() - consumed
        )));
    }
    Ok(item)
}

fn decode_item(input: &[u8], depth: usize) -> Result<(RlpItem<'_>, usize), TypesError> {
    let prefix = *input
        .first()
        .ok_or_else(|| TypesError::Rlp("unexpected end of input".to_string()))?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(&input[..1]), 1)),
        0x80..=0xbf => {
            let (offset, len) = decode_length(input, STRING_OFFSET)?;
            let body = slice(input, offset, len)?;
            if len == 1 && body[0] < STRING_OFFSET {
                return Err(TypesError::Rlp("single byte below 0x80 must not be prefixed".to_string()));
            }
            Ok((RlpItem::Bytes(body), offset + len))
        }
        0xc0..=0xff => {
            if depth >= MAX_DEPTH {
                return Err(TypesError::Rlp(format!("lists nested deeper than {MAX_DEPTH}")));
            }
            let (offset, len) = decode_length(input, LIST_OFFSET)?;
            let mut body = slice(input, offset, len)?;
            let mut items = Vec::new();
            while !body.is_empty() {
                let (item, used) = decode_item(body, depth + 1)?;
                items.push(item);
                body = &body[used..];
            }
            Ok((RlpItem::List(items), offset + len))
        }
    }
}

/// Returns (header length, payload length).
fn decode_length(input: &[u8], offset: u8) -> Result<(usize, usize), TypesError> {
    let short = input[0] - offset;
    if short as usize <= SHORT_LIMIT {
        return Ok((1, short as usize));
    }

    let len_of_len = short as usize - SHORT_LIMIT;
    let len_bytes = slice(input, 1, len_of_len)?;
    if len_bytes[0] == 0 {
        return Err(TypesError::Rlp("length has leading zero".to_string()));
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(TypesError::Rlp("length does not fit in usize".to_string()));
    }
    let len = len_bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len <= SHORT_LIMIT {
        return Err(TypesError::Rlp("long form used for short payload".to_string()));
    }
    Ok((1 + len_of_len, len))
}

fn slice(input: &[u8], start: usize, len: usize) -> Result<&[u8], TypesError> {
    start
        .checked_add(len)
        .and_then(|end| input.get(start..end))
        .ok_or_else(|| TypesError::Rlp("unexpected end of input".to_string()))
}
