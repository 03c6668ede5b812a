//! # RESP Values
//!
//! Purpose: Model a decoded RESP2 reply as a closed tagged union so reply
//! mapping can match on shape instead of probing dynamic types.
//!
//! ## Design Principles
//! 1. **Null Is Not Empty**: `Bulk(None)` and `Array(None)` are the `-1`
//!    markers and never collapse into `Bulk(Some(""))` or `Array(Some([]))`.
//! 2. **Binary-Safe**: Bulk payloads stay raw bytes; text decoding is a
//!    reply-mapping decision.
//! 3. **Cheap Clones**: Bulk payloads are `Bytes`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::writer::put_decimal;

/// One complete RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK` style status line.
    Simple(String),
    /// `-ERR ...` error line.
    Error(String),
    /// `:123` signed integer.
    Integer(i64),
    /// `$n` bulk string, `None` for `$-1`.
    Bulk(Option<Bytes>),
    /// `*n` array, `None` for `*-1`. Elements may nest.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Builds a non-null bulk value from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        RespValue::Bulk(Some(data.into()))
    }

    /// Builds a non-null array.
    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    /// Short human-readable tag, used in reply-shape error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RespValue::Simple(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::Bulk(Some(_)) => "bulk string",
            RespValue::Bulk(None) => "null bulk string",
            RespValue::Array(Some(_)) => "array",
            RespValue::Array(None) => "null array",
        }
    }

    /// True for the `$-1` and `*-1` markers.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Bulk(None) | RespValue::Array(None))
    }

    /// Serializes the value in RESP2 framing.
    pub fn encode(&self, out: &mut BytesMut) {
        match self {
            RespValue::Simple(text) => put_line(out, b'+', text.as_bytes()),
            RespValue::Error(text) => put_line(out, b'-', text.as_bytes()),
            RespValue::Integer(value) => {
                out.put_u8(b':');
                if *value < 0 {
                    out.put_u8(b'-');
                }
                put_decimal(out, value.unsigned_abs());
                out.put_slice(b"\r\n");
            }
            RespValue::Bulk(None) => out.put_slice(b"$-1\r\n"),
            RespValue::Bulk(Some(data)) => {
                out.put_u8(b'$');
                put_decimal(out, data.len() as u64);
                out.put_slice(b"\r\n");
                out.put_slice(data);
                out.put_slice(b"\r\n");
            }
            RespValue::Array(None) => out.put_slice(b"*-1\r\n"),
            RespValue::Array(Some(items)) => {
                out.put_u8(b'*');
                put_decimal(out, items.len() as u64);
                out.put_slice(b"\r\n");
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    /// Serializes the value into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.encode(&mut out);
        out.freeze()
    }
}

fn put_line(out: &mut BytesMut, prefix: u8, body: &[u8]) {
    out.put_u8(prefix);
    out.put_slice(body);
    out.put_slice(b"\r\n");
}
