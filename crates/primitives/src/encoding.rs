//! Little-endian consensus serialization with CompactSize length prefixes.

use std::fmt;

use bczd_consensus::Hash256;

/// Largest CompactSize accepted when decoding.
const MAX_COMPACT_SIZE: u64 = 0x0200_0000;

#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_hash_le(&mut self, hash: &Hash256) {
        self.write_bytes(hash);
    }

    pub fn write_varint(&mut self, value: u64) {
        match value {
            0..=0xfc => self.buf.push(value as u8),
            0xfd..=0xffff => {
                self.buf.push(0xfd);
                self.write_bytes(&(value as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(0xfe);
                self.write_bytes(&(value as u32).to_le_bytes());
            }
            _ => {
                self.buf.push(0xff);
                self.write_bytes(&value.to_le_bytes());
            }
        }
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    pub fn write_var_str(&mut self, value: &str) {
        self.write_var_bytes(value.as_bytes());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof,
    NonCanonicalVarInt,
    SizeTooLarge,
    InvalidData(&'static str),
    TrailingBytes,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeError::NonCanonicalVarInt => write!(f, "non-canonical CompactSize"),
            DecodeError::SizeTooLarge => write!(f, "compact size exceeds maximum"),
            DecodeError::InvalidData(message) => write!(f, "{message}"),
            DecodeError::TrailingBytes => write!(f, "trailing bytes after decode"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub struct Decoder<'a> {
    input: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.input.len() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(head)
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_fixed()?))
    }

    pub fn read_hash_le(&mut self) -> Result<Hash256, DecodeError> {
        self.read_fixed()
    }

    /// CompactSize; rejects non-minimal encodings and sizes above the limit.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let (value, min) = match self.take(1)?[0] {
            prefix @ 0..=0xfc => (u64::from(prefix), 0),
            0xfd => (u64::from(u16::from_le_bytes(self.read_fixed()?)), 0xfd),
            0xfe => (u64::from(u32::from_le_bytes(self.read_fixed()?)), 0x1_0000),
            _ => (u64::from_le_bytes(self.read_fixed()?), 0x1_0000_0000),
        };
        if value < min {
            return Err(DecodeError::NonCanonicalVarInt);
        }
        if value > MAX_COMPACT_SIZE {
            return Err(DecodeError::SizeTooLarge);
        }
        Ok(value)
    }

    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = usize::try_from(self.read_varint()?).map_err(|_| DecodeError::SizeTooLarge)?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_var_str(&mut self) -> Result<String, DecodeError> {
        String::from_utf8(self.read_var_bytes()?)
            .map_err(|_| DecodeError::InvalidData("invalid utf8 string"))
    }
}

pub trait Encodable {
    fn consensus_encode(&self, encoder: &mut Encoder);
}

pub trait Decodable: Sized {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError>;
}

pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    let mut encoder = Encoder::new();
    value.consensus_encode(&mut encoder);
    encoder.into_inner()
}

impl<T: Encodable> Encodable for Vec<T> {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_varint(self.len() as u64);
        for item in self {
            item.consensus_encode(encoder);
        }
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let len = decoder.read_varint()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::SizeTooLarge)?;
        // Every element takes at least one byte.
        if len > decoder.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::consensus_decode(decoder)?);
        }
        Ok(items)
    }
}

pub fn decode<T: Decodable>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut decoder = Decoder::new(bytes);
    let value = T::consensus_decode(&mut decoder)?;
    if !decoder.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0x0200_0000] {
            let mut encoder = Encoder::new();
            encoder.write_varint(value);
            let bytes = encoder.into_inner();
            let mut decoder = Decoder::new(&bytes);
            assert_eq!(decoder.read_varint().expect("varint"), value);
            assert!(decoder.is_empty());
        }
    }

    #[test]
    fn non_canonical_varint_rejected() {
        let bytes = [0xfd, 0x10, 0x00];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_varint(), Err(DecodeError::NonCanonicalVarInt));
    }

    #[test]
    fn oversized_compact_rejected() {
        let bytes = [0xfe, 0x01, 0x00, 0x00, 0x04];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_varint(), Err(DecodeError::SizeTooLarge));
    }

    #[test]
    fn var_str_and_trailing_bytes() {
        let mut encoder = Encoder::new();
        encoder.write_var_str("MasternodeCache");
        encoder.write_bool(true);
        let bytes = encoder.into_inner();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_var_str().expect("str"), "MasternodeCache");
        assert!(decoder.read_bool().expect("bool"));
        assert!(decoder.is_empty());
    }

    #[test]
    fn vec_length_larger_than_input_is_eof() {
        let bytes = [0x05, 0x01];
        let result: Result<Vec<crate::outpoint::OutPoint>, _> = decode(&bytes);
        assert_eq!(result, Err(DecodeError::UnexpectedEof));
    }
}
