//! # Codec Errors
//!
//! Purpose: Separate malformed framing from stream failures so the
//! connection layer can tell "the bytes were wrong" from "the bytes never
//! arrived". Both are fatal to the connection that produced them.

use std::io;

/// Malformed RESP framing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// First byte of a value is not one of `+ - : $ *`.
    #[error("invalid prefix byte: {0:#04x}")]
    InvalidPrefix(u8),

    /// Integer line or length header is not a signed decimal.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Negative length other than the `-1` null marker.
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// A line or bulk payload is not followed by CRLF.
    #[error("missing CRLF terminator")]
    MissingTerminator,

    /// Bulk header declares more bytes than the configured limit.
    #[error("bulk string too long: {len} bytes exceeds {max} byte limit")]
    BulkTooLong { len: usize, max: usize },

    /// A header or status line runs past the configured limit without CRLF.
    #[error("line too long: exceeds {max} byte limit")]
    LineTooLong { max: usize },

    /// A status or error line is not valid UTF-8.
    #[error("status line is not valid UTF-8")]
    InvalidUtf8,

    /// Arrays nest deeper than the configured limit.
    #[error("nesting too deep: depth {0} exceeds limit")]
    NestingTooDeep(usize),
}

/// Failure while reading one reply from a stream.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The underlying stream failed or hit EOF mid-value.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The stream delivered bytes that are not valid RESP.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type ReadResult<T> = Result<T, ReadError>;
