//! # Pooled Client API
//!
//! Purpose: Expose a compact, blocking API for issuing commands through a
//! connection pool, plus the async and pipelined entry points.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RedisClient` hides pooling and protocol details.
//! 2. **One Borrow Per Call**: Each method acquires a connection, runs one
//!    command (or one pipeline), and gives the connection back.
//! 3. **Descriptors Everywhere**: Methods are thin wrappers over
//!    `commands::*`; anything not wrapped here is one `execute` away.

use std::time::Duration;

use bytes::Bytes;
use respool_proto::Arg;

use crate::command::Command;
use crate::commands::{self, Ttl};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::Pipeline;
use crate::pool::ConnectionPool;
use crate::role::Role;
use crate::scan::{self, ScanOptions};

/// Blocking client backed by a [`ConnectionPool`].
///
/// Cheap to clone; clones share the pool.
#[derive(Clone, Debug)]
pub struct RedisClient {
    pool: ConnectionPool,
}

impl RedisClient {
    /// Creates a client for `host:port` with default pool settings.
    pub fn connect(host: impl Into<String>, port: u16) -> ClientResult<Self> {
        Self::with_config(ClientConfig::new(host, port))
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        Ok(RedisClient {
            pool: ConnectionPool::new(&config)?,
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: ConnectionPool) -> Self {
        RedisClient { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs an arbitrary operation on a pooled connection.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<ClientError>,
    {
        self.pool.run(op)
    }

    /// Async variant of [`RedisClient::run`].
    pub async fn run_async<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<ClientError> + Send + 'static,
    {
        self.pool.run_async(op).await
    }

    /// Executes any command descriptor on a pooled connection.
    pub fn execute<T>(&self, command: &Command<T>) -> ClientResult<T> {
        self.pool.run(|conn| conn.execute(command))
    }

    /// Async variant of [`RedisClient::execute`].
    pub async fn execute_async<T: Send + 'static>(&self, command: Command<T>) -> ClientResult<T> {
        self.pool.run_async(move |conn| conn.execute(&command)).await
    }

    /// Queues commands with `build` on one pooled connection and flushes them.
    ///
    /// Results line up with the order commands were sent.
    pub fn pipeline<T, F>(&self, build: F) -> ClientResult<Vec<ClientResult<T>>>
    where
        F: FnOnce(&mut Pipeline<'_, T>) -> ClientResult<()>,
    {
        self.pool.run(|conn| {
            let mut pipeline = conn.pipeline()?;
            build(&mut pipeline)?;
            pipeline.flush()
        })
    }

    /// Pings the server and returns its reply text.
    pub fn ping(&self) -> ClientResult<String> {
        self.execute(&commands::ping())
    }

    /// Fetches a value by key. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: impl Into<Arg>) -> ClientResult<Option<String>> {
        self.execute(&commands::get(key))
    }

    /// Fetches a value without UTF-8 decoding.
    pub fn get_bytes(&self, key: impl Into<Arg>) -> ClientResult<Option<Bytes>> {
        self.execute(&commands::get_bytes(key))
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: impl Into<Arg>, value: impl Into<Arg>) -> ClientResult<()> {
        self.execute(&commands::set(key, value))
    }

    /// Sets a value and attaches an expiration in seconds.
    pub fn set_with_ttl(
        &self,
        key: impl Into<Arg>,
        value: impl Into<Arg>,
        ttl: Duration,
    ) -> ClientResult<()> {
        self.execute(&commands::set_ex(key, value, ttl))
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn delete(&self, key: impl Into<Arg>) -> ClientResult<bool> {
        self.execute(&commands::del([key])).map(|removed| removed > 0)
    }

    /// Sets a time-to-live on a key. Returns true when the TTL was set.
    pub fn expire(&self, key: impl Into<Arg>, ttl: Duration) -> ClientResult<bool> {
        self.execute(&commands::expire(key, ttl))
    }

    /// Returns TTL status for a key.
    pub fn ttl(&self, key: impl Into<Arg>) -> ClientResult<Ttl> {
        self.execute(&commands::ttl(key))
    }

    pub fn incr(&self, key: impl Into<Arg>) -> ClientResult<i64> {
        self.execute(&commands::incr(key))
    }

    pub fn mget<K: Into<Arg>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> ClientResult<Vec<Option<String>>> {
        self.execute(&commands::mget(keys))
    }

    pub fn hgetall(&self, key: impl Into<Arg>) -> ClientResult<Vec<(String, String)>> {
        self.execute(&commands::hgetall(key))
    }

    pub fn dbsize(&self) -> ClientResult<i64> {
        self.execute(&commands::dbsize())
    }

    /// Fetches server INFO output, optionally for one section.
    pub fn info(&self, section: Option<&str>) -> ClientResult<String> {
        self.execute(&commands::info(section))
    }

    pub fn role(&self) -> ClientResult<Role> {
        self.execute(&commands::role())
    }

    /// Walks the whole keyspace with `SCAN` on one pooled connection.
    ///
    /// Keys may repeat or be missed if the keyspace changes during the walk.
    pub fn scan_all(&self, options: &ScanOptions) -> ClientResult<Vec<String>> {
        self.pool
            .run(|conn| scan::collect(conn, |cursor| commands::scan(cursor, options)))
    }
}
