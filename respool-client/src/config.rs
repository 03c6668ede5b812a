//! # Client Configuration
//!
//! Purpose: One serde-friendly struct describing the endpoint, credentials,
//! pool bounds, socket timeouts and decoder limits.
//!
//! Durations are read from millisecond fields (`acquire_timeout_ms`, ...)
//! so the struct can be loaded from JSON or TOML without custom formats.

use std::time::Duration;

use serde::Deserialize;

use respool_proto::{ReadLimits, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH};

use crate::error::{ClientError, ClientResult};

/// Default permit count, matching the classic pooled client.
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Default bound on waiting for a pool permit.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for connections and the pool that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Credential sent with AUTH once per new connection.
    pub password: Option<String>,
    /// Maximum number of connections borrowed at once.
    pub max_connections: usize,
    /// How long `acquire` waits for a free permit.
    #[serde(rename = "acquire_timeout_ms", with = "millis")]
    pub acquire_timeout: Duration,
    /// Optional TCP connect timeout.
    #[serde(rename = "connect_timeout_ms", with = "optional_millis")]
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    #[serde(rename = "read_timeout_ms", with = "optional_millis")]
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    #[serde(rename = "write_timeout_ms", with = "optional_millis")]
    pub write_timeout: Option<Duration>,
    /// Largest bulk reply accepted, in bytes.
    pub max_bulk_len: usize,
    /// Deepest reply nesting accepted.
    pub max_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ClientConfig {
    /// Configuration for `host:port` with every other field defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            ..ClientConfig::default()
        }
    }

    /// Sets the AUTH credential.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the pool bound.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the permit wait bound.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Decoder limits derived from this configuration.
    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits {
            max_bulk_len: self.max_bulk_len,
            max_depth: self.max_depth,
        }
    }

    /// Rejects configurations the pool cannot honor.
    pub fn validate(&self) -> ClientResult<()> {
        if self.host.is_empty() {
            return Err(ClientError::InvalidConfig("host must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(ClientError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "acquire_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
