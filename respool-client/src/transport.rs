//! # Transport Boundary
//!
//! Purpose: Describe the duplex byte stream a connection needs and the
//! factory the pool uses to open new ones, without choosing plaintext or TLS.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: `Connector` is swappable; TCP is just the default.
//! 2. **Blocking I/O**: Streams are plain `Read + Write`; suspension only
//!    happens in the pool's asynchronous acquire.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::ClientConfig;

/// Duplex byte stream owned by one connection.
pub trait Transport: Read + Write + Send {
    /// Tears the stream down. Errors are reported but the stream is unusable
    /// afterwards either way.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Opens fresh transports for the pool.
pub trait Connector: Send + Sync {
    fn connect(&self) -> io::Result<Box<dyn Transport>>;
}

impl<F> Connector for F
where
    F: Fn() -> io::Result<Box<dyn Transport>> + Send + Sync,
{
    fn connect(&self) -> io::Result<Box<dyn Transport>> {
        self()
    }
}

/// Plain TCP connector with optional socket timeouts.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        TcpConnector {
            host: host.into(),
            port,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        TcpConnector {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    /// Connects to the first resolved address that accepts.
    pub fn connect_tcp(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match self.connect_addr(addr) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}:{} did not resolve to any address", self.host, self.port),
            )
        }))
    }

    fn connect_addr(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.connect_tcp()?))
    }
}
