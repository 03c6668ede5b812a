//! # Connection
//!
//! Purpose: Own one duplex stream to the server and enforce strict
//! request/reply ordering on it, either one command at a time or as a
//! pipelined batch.
//!
//! ## Design Principles
//! 1. **One Outstanding Operation**: `execute` writes then reads exactly one
//!    reply; a pipeline holds `&mut Connection` so nothing else can interleave.
//! 2. **Poison On Desync**: Any transport or framing failure marks the
//!    connection broken. A broken connection refuses further work and the pool
//!    never hands it out again.
//! 3. **Buffer Reuse**: The request buffer and line buffer live on the
//!    connection and are reused across commands.

use std::io::{BufReader, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use respool_proto::{read_value, ReadLimits, RespValue};
use tracing::{debug, warn};

use crate::command::Command;
use crate::commands;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::Pipeline;
use crate::transport::{TcpConnector, Transport};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const NOT_OPEN: &str = "connection is not open";
pub(crate) const BROKEN: &str = "connection was poisoned by an earlier transport failure";
const PIPELINING: &str = "connection is in pipeline mode";

/// A single server connection.
///
/// Not safe for concurrent use; share it through a `ConnectionPool` instead.
pub struct Connection {
    id: u64,
    // Buffered reader for replies; writes go through `get_mut()`.
    reader: Option<BufReader<Box<dyn Transport>>>,
    pub(crate) write_buf: BytesMut,
    line_buf: Vec<u8>,
    limits: ReadLimits,
    pub(crate) pipelining: bool,
    broken: bool,
}

impl Connection {
    /// Creates an unopened connection. Every operation fails with
    /// `ClientError::ConnectionState` until a transport is attached.
    pub fn new() -> Self {
        Connection {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            reader: None,
            write_buf: BytesMut::with_capacity(256),
            line_buf: Vec::with_capacity(128),
            limits: ReadLimits::default(),
            pipelining: false,
            broken: false,
        }
    }

    /// Opens a TCP connection described by `config` and authenticates it when
    /// a password is configured.
    pub fn open(config: &ClientConfig) -> ClientResult<Self> {
        let stream = TcpConnector::from_config(config).connect_tcp()?;
        let mut conn = Connection::with_transport(Box::new(stream), config.read_limits());
        debug!(conn_id = conn.id, "Connected to {}:{}", config.host, config.port);
        if let Some(password) = &config.password {
            conn.auth(password)?;
        }
        Ok(conn)
    }

    /// Wraps an already-connected transport.
    pub fn with_transport(transport: Box<dyn Transport>, limits: ReadLimits) -> Self {
        let mut conn = Connection::new();
        conn.limits = limits;
        conn.attach(transport);
        conn
    }

    /// Replaces the underlying stream, closing the previous one and clearing
    /// any poison or pipeline state.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.shutdown_stream();
        self.reader = Some(BufReader::new(transport));
        self.write_buf.clear();
        self.pipelining = false;
        self.broken = false;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// True once a transport or protocol failure has desynchronized the stream.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn is_pipelining(&self) -> bool {
        self.pipelining
    }

    /// True when the connection could be handed to another borrower.
    pub(crate) fn is_reusable(&self) -> bool {
        self.is_open() && !self.broken && !self.pipelining
    }

    /// Sends one command and waits for its reply.
    pub fn execute<T>(&mut self, command: &Command<T>) -> ClientResult<T> {
        self.ensure_ready()?;
        self.write_buf.clear();
        command.encode(&mut self.write_buf);
        self.send_buffer(true)?;
        let reply = self.read_reply()?;
        command.map_reply(reply)
    }

    /// Enters pipeline mode. Commands queued on the returned pipeline are
    /// written without waiting; `Pipeline::flush` reads every reply in order.
    pub fn pipeline<T>(&mut self) -> ClientResult<Pipeline<'_, T>> {
        self.ensure_ready()?;
        self.write_buf.clear();
        self.pipelining = true;
        Ok(Pipeline::new(self))
    }

    /// Sends `AUTH password`.
    pub fn auth(&mut self, password: &str) -> ClientResult<()> {
        self.execute(&commands::auth(password))
    }

    /// Tears the stream down. Closing an unopened connection is a no-op.
    pub fn close(&mut self) -> ClientResult<()> {
        self.pipelining = false;
        self.write_buf.clear();
        match self.reader.take() {
            Some(reader) => {
                debug!(conn_id = self.id, "Closing connection");
                let mut transport = reader.into_inner();
                transport.shutdown()?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn shutdown_stream(&mut self) {
        if let Err(err) = self.close() {
            debug!(conn_id = self.id, "Shutdown error: {}", err);
        }
    }

    fn ensure_ready(&self) -> ClientResult<()> {
        if self.reader.is_none() {
            return Err(ClientError::ConnectionState(NOT_OPEN));
        }
        if self.broken {
            return Err(ClientError::ConnectionState(BROKEN));
        }
        if self.pipelining {
            return Err(ClientError::ConnectionState(PIPELINING));
        }
        Ok(())
    }

    /// Writes out and clears the request buffer.
    pub(crate) fn send_buffer(&mut self, flush: bool) -> ClientResult<()> {
        let reader = self
            .reader
            .as_mut()
            .ok_or(ClientError::ConnectionState(NOT_OPEN))?;
        let stream = reader.get_mut();
        let mut result = stream.write_all(&self.write_buf);
        if result.is_ok() && flush {
            result = stream.flush();
        }
        self.write_buf.clear();
        result.map_err(|err| self.poison(err.into()))
    }

    /// Reads one complete reply frame.
    pub(crate) fn read_reply(&mut self) -> ClientResult<RespValue> {
        let reader = self
            .reader
            .as_mut()
            .ok_or(ClientError::ConnectionState(NOT_OPEN))?;
        read_value(reader, &mut self.line_buf, &self.limits).map_err(|err| self.poison(err.into()))
    }

    /// Marks the connection broken when `err` desynchronizes the stream.
    pub(crate) fn poison(&mut self, err: ClientError) -> ClientError {
        if err.is_fatal() {
            self.mark_broken(&err);
        }
        err
    }

    pub(crate) fn mark_broken(&mut self, reason: &dyn std::fmt::Display) {
        if !self.broken {
            warn!(conn_id = self.id, "Connection poisoned: {}", reason);
        }
        self.broken = true;
        self.pipelining = false;
        self.write_buf.clear();
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown_stream();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("broken", &self.broken)
            .field("pipelining", &self.pipelining)
            .finish()
    }
}
