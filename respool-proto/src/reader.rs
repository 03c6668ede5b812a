//! # Reply Reader
//!
//! Purpose: Pull exactly one complete RESP2 value off a buffered stream,
//! blocking until it is available or the stream fails.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down; nested arrays recurse.
//! 2. **Buffer Reuse**: The caller provides the line buffer.
//! 3. **Binary-Safe**: Bulk payloads are read by length, never by delimiter.
//! 4. **Fail Fast**: Framing violations are `ProtocolError`s, EOF mid-value is
//!    an `UnexpectedEof` I/O error. Neither is recoverable by reading again.

use std::io::{self, BufRead, Read};

use bytes::Bytes;

use crate::error::{ProtocolError, ReadResult};
use crate::value::RespValue;

/// Largest bulk payload accepted by default (the server's own default cap).
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted by default.
pub const DEFAULT_MAX_DEPTH: usize = 32;

// Cap on up-front array allocation; larger arrays grow as elements arrive.
const MAX_PREALLOC_ITEMS: usize = 1024;

/// Upper bounds applied while decoding, so a corrupt header cannot trigger a
/// huge allocation or unbounded recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Maximum bulk string length in bytes. Also bounds every header and
    /// status line, prefix byte included.
    pub max_bulk_len: usize,
    /// Maximum array nesting depth (a flat array has depth 1).
    pub max_depth: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        ReadLimits {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Reads one RESP value from the buffered reader.
pub fn read_value<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    limits: &ReadLimits,
) -> ReadResult<RespValue> {
    read_nested(reader, line_buf, limits, 0)
}

fn read_nested<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    limits: &ReadLimits,
    depth: usize,
) -> ReadResult<RespValue> {
    read_line(reader, line_buf, limits)?;
    let prefix = match line_buf.first() {
        Some(&byte) => byte,
        None => return Err(ProtocolError::InvalidPrefix(b'\r').into()),
    };

    match prefix {
        b'+' => Ok(RespValue::Simple(text(&line_buf[1..])?)),
        b'-' => Ok(RespValue::Error(text(&line_buf[1..])?)),
        b':' => Ok(RespValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            read_bulk(reader, len, limits)
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            read_array(reader, len, line_buf, limits, depth + 1)
        }
        other => Err(ProtocolError::InvalidPrefix(other).into()),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64, limits: &ReadLimits) -> ReadResult<RespValue> {
    let len = match checked_len(len)? {
        Some(len) => len,
        None => return Ok(RespValue::Bulk(None)),
    };
    if len > limits.max_bulk_len {
        return Err(ProtocolError::BulkTooLong {
            len,
            max: limits.max_bulk_len,
        }
        .into());
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(ProtocolError::MissingTerminator.into());
    }
    Ok(RespValue::Bulk(Some(Bytes::from(data))))
}

fn read_array<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
    limits: &ReadLimits,
    depth: usize,
) -> ReadResult<RespValue> {
    let len = match checked_len(len)? {
        Some(len) => len,
        None => return Ok(RespValue::Array(None)),
    };
    if depth > limits.max_depth {
        return Err(ProtocolError::NestingTooDeep(depth).into());
    }

    let mut items = Vec::with_capacity(len.min(MAX_PREALLOC_ITEMS));
    for _ in 0..len {
        items.push(read_nested(reader, line_buf, limits, depth)?);
    }
    Ok(RespValue::Array(Some(items)))
}

/// `-1` is the null marker; any other negative length is malformed.
fn checked_len(len: i64) -> ReadResult<Option<usize>> {
    match len {
        -1 => Ok(None),
        len if len < -1 => Err(ProtocolError::InvalidLength(len).into()),
        len => usize::try_from(len)
            .map(Some)
            .map_err(|_| ProtocolError::InvalidLength(len).into()),
    }
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limits: &ReadLimits) -> ReadResult<()> {
    buf.clear();
    let cap = limits.max_bulk_len.saturating_add(2);
    let bytes = reader.by_ref().take(cap as u64).read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed mid-reply").into());
    }
    if buf.last() != Some(&b'\n') {
        if buf.len() >= cap {
            return Err(ProtocolError::LineTooLong {
                max: limits.max_bulk_len,
            }
            .into());
        }
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed mid-reply").into());
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ProtocolError::MissingTerminator.into());
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn text(data: &[u8]) -> ReadResult<String> {
    String::from_utf8(data.to_vec()).map_err(|_| ProtocolError::InvalidUtf8.into())
}

fn parse_i64(data: &[u8]) -> ReadResult<i64> {
    let invalid = || ProtocolError::InvalidInteger(String::from_utf8_lossy(data).into_owned());
    let (negative, digits) = match data.split_first() {
        Some((&b'-', rest)) => (true, rest),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(invalid().into());
    }

    // Accumulate negatively so i64::MIN round-trips without overflow.
    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(invalid().into());
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_sub((b - b'0') as i64))
            .ok_or_else(invalid)?;
    }

    if negative {
        Ok(value)
    } else {
        value.checked_neg().ok_or_else(|| invalid().into())
    }
}
