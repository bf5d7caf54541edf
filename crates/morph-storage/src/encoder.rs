//! Row encoding and decoding.
//!
//! Rows are stored as compact byte buffers. A row codec is built from the
//! table's current `TableSchema`; there is no per-table generated type.
//!
//! # Encoding Format
//!
//! - Number of encoded columns (4 bytes, big-endian)
//! - For each column: type tag (1 byte) followed by the payload
//!   - Null: no payload
//!   - Boolean: 1 byte
//!   - Int: 4 bytes, little-endian
//!   - String: length (4 bytes, little-endian) + UTF-8 bytes
//!
//! A row encoded before a column was appended carries fewer columns than
//! the schema; the missing trailing columns decode as NULL. This is what
//! makes adding a column free for existing rows.

use bytes::{BufMut, Bytes, BytesMut};
use morph_common::Value;

use crate::error::{StorageError, StorageResult};
use crate::schema::TableSchema;

/// Type tags for binary encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum TypeTag {
    Null = 0,
    Boolean = 1,
    Int = 2,
    String = 3,
}

impl TypeTag {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(TypeTag::Null),
            1 => Some(TypeTag::Boolean),
            2 => Some(TypeTag::Int),
            3 => Some(TypeTag::String),
            _ => None,
        }
    }
}

/// Row encoder for converting values to stored bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowEncoder;

impl RowEncoder {
    /// Creates a new row encoder.
    pub fn new() -> Self {
        Self
    }

    /// Encodes positional values to a storage buffer.
    pub fn encode(&self, values: &[Value]) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + values.len() * 8);
        buf.put_u32(values.len() as u32);

        for value in values {
            match value {
                Value::Null => buf.put_u8(TypeTag::Null as u8),
                Value::Boolean(b) => {
                    buf.put_u8(TypeTag::Boolean as u8);
                    buf.put_u8(u8::from(*b));
                }
                Value::Int(i) => {
                    buf.put_u8(TypeTag::Int as u8);
                    buf.put_i32_le(*i);
                }
                Value::String(s) => {
                    buf.put_u8(TypeTag::String as u8);
                    buf.put_u32_le(s.len() as u32);
                    buf.put_slice(s.as_bytes());
                }
            }
        }

        buf.freeze()
    }
}

/// Row decoder bound to a table's column count.
#[derive(Debug, Clone, Copy)]
pub struct RowDecoder {
    /// Number of columns in the schema the decoder was built from.
    width: usize,
}

impl RowDecoder {
    /// Creates a decoder for rows of `schema`.
    pub fn new(schema: &TableSchema) -> Self {
        Self {
            width: schema.len(),
        }
    }

    /// Decodes a stored buffer into exactly `width` positional values.
    pub fn decode(&self, bytes: &[u8]) -> StorageResult<Vec<Value>> {
        if bytes.len() < 4 {
            return Err(StorageError::encoding("value too short"));
        }
        let num_cols = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if num_cols > self.width {
            return Err(StorageError::encoding(format!(
                "row has {} columns, schema has {}",
                num_cols, self.width
            )));
        }

        let mut pos = 4;
        let mut values = Vec::with_capacity(self.width);
        for _ in 0..num_cols {
            let (value, consumed) = decode_single_value(&bytes[pos..])?;
            values.push(value);
            pos += consumed;
        }

        if pos != bytes.len() {
            return Err(StorageError::encoding("trailing bytes after row"));
        }

        values.resize(self.width, Value::Null);
        Ok(values)
    }
}

fn decode_single_value(bytes: &[u8]) -> StorageResult<(Value, usize)> {
    let Some(&first) = bytes.first() else {
        return Err(StorageError::encoding("unexpected end of data"));
    };

    let tag = TypeTag::from_u8(first)
        .ok_or_else(|| StorageError::encoding(format!("unknown type tag: {}", first)))?;

    match tag {
        TypeTag::Null => Ok((Value::Null, 1)),
        TypeTag::Boolean => {
            let b = *bytes
                .get(1)
                .ok_or_else(|| StorageError::encoding("missing boolean value"))?;
            Ok((Value::Boolean(b != 0), 2))
        }
        TypeTag::Int => {
            let raw: [u8; 4] = bytes
                .get(1..5)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| StorageError::encoding("missing int value"))?;
            Ok((Value::Int(i32::from_le_bytes(raw)), 5))
        }
        TypeTag::String => {
            let raw: [u8; 4] = bytes
                .get(1..5)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| StorageError::encoding("missing string length"))?;
            let len = u32::from_le_bytes(raw) as usize;
            let data = bytes
                .get(5..5 + len)
                .ok_or_else(|| StorageError::encoding("truncated string value"))?;
            let s = std::str::from_utf8(data)
                .map_err(|e| StorageError::encoding(format!("invalid UTF-8: {}", e)))?;
            Ok((Value::String(s.to_string()), 5 + len))
        }
    }
}
