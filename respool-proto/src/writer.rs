//! # Request Writer
//!
//! Purpose: Frame one command as a RESP array of bulk strings.
//!
//! ## Design Principles
//! 1. **Buffer Reuse**: The caller owns the output buffer; nothing is flushed
//!    here, writing only appends bytes.
//! 2. **Binary-Safe**: `Arg::Binary` is copied byte-for-byte, `Arg::Text` is
//!    written as UTF-8.
//! 3. **Allocation-Free Lengths**: Length headers are rendered on the stack.
//!
//! ## Wire Layout
//!
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<name>\r\n
//! $<len>\r\n<arg 1>\r\n
//! ...
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// One command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Text, encoded as UTF-8 on the wire.
    Text(String),
    /// Raw bytes, written without transcoding.
    Binary(Bytes),
}

impl Arg {
    /// Wire bytes of the argument.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Arg::Text(text) => text.as_bytes(),
            Arg::Binary(data) => data,
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Text(value.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Binary(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Binary(Bytes::from(value))
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Binary(value)
    }
}

macro_rules! numeric_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Text(value.to_string())
                }
            }
        )*
    };
}

// f64 renders infinities as `inf` / `-inf`, which the server accepts.
numeric_arg!(i32, i64, u32, u64, usize, f64);

/// Appends one RESP request (`name` followed by `args`) to `out`.
pub fn encode_request(name: &str, args: &[Arg], out: &mut BytesMut) {
    let payload: usize = name.len() + args.iter().map(|arg| arg.as_bytes().len()).sum::<usize>();
    // Header digits and CRLFs are small; reserve once for the common case.
    out.reserve(payload + 16 * (args.len() + 2));

    out.put_u8(b'*');
    put_decimal(out, (args.len() + 1) as u64);
    out.put_slice(b"\r\n");
    put_bulk(out, name.as_bytes());
    for arg in args {
        put_bulk(out, arg.as_bytes());
    }
}

fn put_bulk(out: &mut BytesMut, data: &[u8]) {
    out.put_u8(b'$');
    put_decimal(out, data.len() as u64);
    out.put_slice(b"\r\n");
    out.put_slice(data);
    out.put_slice(b"\r\n");
}

pub(crate) fn put_decimal(out: &mut BytesMut, value: u64) {
    // u64::MAX has 20 digits; fill from the right, then copy once.
    let mut digits = [0u8; 20];
    let mut start = digits.len();
    let mut rest = value;
    loop {
        start -= 1;
        digits[start] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    out.put_slice(&digits[start..]);
}
