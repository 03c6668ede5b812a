//! # Client Errors
//!
//! Purpose: Keep "the server rejected this" apart from "the connection is
//! dead" so callers and the pool can react differently.
//!
//! ## Taxonomy
//! - `ConnectionState`: local precondition failure, nothing was sent.
//! - `Protocol` / `Io`: fatal, the connection is poisoned and never reused.
//! - `Server`: a `-` reply; the connection stays healthy.
//! - `UnexpectedReply`: a well-framed reply of the wrong shape; the stream is
//!   still in sync, so the connection stays healthy.
//! - `PoolExhausted`: no permit within the acquire timeout; no side effects.

use std::io;
use std::time::Duration;

use respool_proto::{ProtocolError, ReadError};

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Operation attempted on a connection that cannot serve it.
    #[error("connection state error: {0}")]
    ConnectionState(&'static str),

    /// Malformed RESP framing.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server returned an error reply.
    #[error("server error: {0}")]
    Server(String),

    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// No pool permit became free within the acquire timeout.
    #[error("connection pool exhausted after waiting {0:?}")]
    PoolExhausted(Duration),

    /// Reply shape did not match the command's expected reply.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Configuration rejected before any connection was made.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An asynchronous pooled operation was cancelled by the runtime.
    #[error("pooled operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// True when the connection that produced this error must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::Protocol(_))
    }

    /// True for `-` error replies.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ClientError::Server(_))
    }

    pub(crate) fn unexpected(expected: &str, actual: &str) -> Self {
        ClientError::UnexpectedReply(format!("expected {}, got {}", expected, actual))
    }
}

impl From<ReadError> for ClientError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(err) => ClientError::Io(err),
            ReadError::Protocol(err) => ClientError::Protocol(err),
        }
    }
}
