// respool-proto - RESP2 wire codec for the respool client
//
// This crate frames requests and parses replies; it owns no sockets and no
// connection policy.

pub mod error;
pub mod reader;
pub mod value;
pub mod writer;

// Re-export for convenience
pub use error::*;
pub use reader::{read_value, ReadLimits, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH};
pub use value::RespValue;
pub use writer::{encode_request, Arg};
