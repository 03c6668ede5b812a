//! # respool Client
//!
//! Purpose: Provide a synchronous Redis client with pipelining and a bounded
//! connection pool that can also be driven from async code.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections and cap how many are open.
//! 2. **Typed Replies**: Every command carries a pure mapper from the decoded
//!    reply to its result type.
//! 3. **Health Over Hope**: Transport and framing failures poison the
//!    connection; server error replies do not.
//! 4. **Protocol Clarity**: RESP2 framing lives in `respool-proto`; this crate
//!    adds connection policy on top.
//!
//! ```no_run
//! use respool_client::{commands, ClientConfig, RedisClient};
//!
//! # fn main() -> respool_client::ClientResult<()> {
//! let client = RedisClient::with_config(ClientConfig::new("127.0.0.1", 6379))?;
//! client.set("greeting", "hello")?;
//! assert_eq!(client.get("greeting")?.as_deref(), Some("hello"));
//!
//! let counts = client.pipeline(|p| {
//!     p.send(&commands::incr("hits"))?;
//!     p.send(&commands::incr("hits"))?;
//!     Ok(())
//! })?;
//! assert_eq!(counts.len(), 2);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod command;
pub mod commands;
mod config;
mod connection;
mod error;
mod pipeline;
mod pool;
pub mod reply;
mod role;
pub mod scan;
mod transport;

pub use client::RedisClient;
pub use command::{Command, ReplyMapper};
pub use commands::Ttl;
pub use config::{ClientConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
pub use connection::Connection;
pub use error::{ClientError, ClientResult};
pub use pipeline::{Pipeline, SPILL_THRESHOLD};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use role::{ReplicaInfo, Role};
pub use scan::{ScanCursor, ScanOptions};
pub use transport::{Connector, TcpConnector, Transport};

// Re-export for convenience
pub use respool_proto::{Arg, ReadLimits, RespValue};
