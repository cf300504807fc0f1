//! Store Connection
//!
//! One stream to the backing store and the read buffer that goes with it.
//! A command is written as a RESP array and the connection then reads until
//! the parser yields exactly one reply.
//!
//! ## Failure Handling
//!
//! ```text
//! execute(cmd)
//!    │
//!    ├── not connected? ──> dial (+ AUTH) ──fails──> Unavailable
//!    │
//!    ├── write command
//!    │
//!    ├── read until one reply is parsed
//!    │
//!    └── any I/O error, timeout or protocol error
//!            └──> drop stream, return Unavailable
//!                 (next execute() dials again)
//! ```
//!
//! The whole round trip, dialing included, is bounded by the I/O timeout.
//! A caller dropped between writing and reading leaves the connection marked
//! in flight; the next command reconnects instead of reading a stale reply.

use crate::commands::{status_reply, Command};
use crate::protocol::{RespParser, RespValue};
use crate::storage::{StoreError, StoreResult};
use bytes::{Buf, BytesMut};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Where the backing store listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAddress {
    /// `host:port`
    Tcp(String),
    /// `unix:/path/to/socket`
    Unix(PathBuf),
}

impl FromStr for StoreAddress {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(StoreError::Unavailable(
                    "unix socket address has no path".to_string(),
                ));
            }
            return Ok(StoreAddress::Unix(PathBuf::from(path)));
        }
        if s.is_empty() {
            return Err(StoreError::Unavailable("store address is empty".to_string()));
        }
        Ok(StoreAddress::Tcp(s.to_string()))
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreAddress::Tcp(addr) => write!(f, "{}", addr),
            StoreAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub address: StoreAddress,
    pub password: Option<String>,
    pub io_timeout: Duration,
}

impl ConnectionOptions {
    pub fn new(address: StoreAddress) -> Self {
        Self {
            address,
            password: None,
            io_timeout: Duration::from_secs(5),
        }
    }
}

/// Anything a store conversation can run over.
pub trait StoreStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> StoreStream for T {}

/// A single connection to the backing store.
pub struct StoreConnection {
    options: ConnectionOptions,
    stream: Option<Box<dyn StoreStream>>,
    buffer: BytesMut,
    parser: RespParser,
    /// Set while a command is written but its reply not yet read. Still set
    /// on entry means the last caller was cancelled mid round trip.
    in_flight: bool,
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection")
            .field("address", &self.options.address)
            .field("connected", &self.stream.is_some())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl StoreConnection {
    /// Creates an unconnected handle; the first command dials.
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            stream: None,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RespParser::new(),
            in_flight: false,
        }
    }

    /// Dials the store immediately, authenticating if a password is set.
    pub async fn connect(options: ConnectionOptions) -> StoreResult<Self> {
        let mut conn = Self::new(options);
        let io_timeout = conn.options.io_timeout;
        match tokio::time::timeout(io_timeout, conn.open()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(StoreError::Unavailable(format!(
                    "connecting to {} timed out after {:?}",
                    conn.options.address, io_timeout
                )))
            }
        }
        Ok(conn)
    }

    /// Wraps an already open stream. Reconnects still dial `options.address`.
    pub fn from_stream<S>(stream: S, options: ConnectionOptions) -> Self
    where
        S: StoreStream + 'static,
    {
        let mut conn = Self::new(options);
        conn.stream = Some(Box::new(stream));
        conn
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn address(&self) -> &StoreAddress {
        &self.options.address
    }

    /// Sends one command and waits for its reply.
    ///
    /// Error replies from the store come back as `Ok(RespValue::Error(_))`;
    /// only transport failures are errors here.
    pub async fn execute(&mut self, command: &Command) -> StoreResult<RespValue> {
        if self.in_flight {
            // The orphaned reply would be read as this command's answer.
            warn!(address = %self.options.address, "Previous command was abandoned, reconnecting");
            self.disconnect();
        }

        let io_timeout = self.options.io_timeout;
        let result = match tokio::time::timeout(io_timeout, self.round_trip(command)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{} timed out after {:?}",
                command.name(),
                io_timeout
            ))),
        };

        if let Err(e) = &result {
            if self.stream.is_some() {
                warn!(address = %self.options.address, error = %e, "Dropping store connection");
            }
            self.disconnect();
        }
        result
    }

    /// `PING`, used to verify the store at startup.
    pub async fn ping(&mut self) -> StoreResult<()> {
        let reply = self.execute(&Command::Ping).await?;
        status_reply("PING", reply)
    }

    fn disconnect(&mut self) {
        self.in_flight = false;
        self.stream = None;
        self.buffer.clear();
        self.parser = RespParser::new();
    }

    async fn round_trip(&mut self, command: &Command) -> StoreResult<RespValue> {
        if self.stream.is_none() {
            self.open().await?;
        }
        self.send_and_receive(command).await
    }

    async fn open(&mut self) -> StoreResult<()> {
        self.disconnect();
        self.stream = Some(dial(&self.options.address).await?);

        if let Some(password) = self.options.password.clone() {
            let reply = self.send_and_receive(&Command::Auth { password }).await?;
            if let Err(e) = status_reply("AUTH", reply) {
                self.disconnect();
                return Err(StoreError::Unavailable(format!("authentication failed: {}", e)));
            }
        }

        info!(address = %self.options.address, "Connected to store");
        Ok(())
    }

    async fn send_and_receive(&mut self, command: &Command) -> StoreResult<RespValue> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| StoreError::Unavailable("not connected".to_string()))?;

        let bytes = command.to_resp().serialize();
        self.in_flight = true;
        stream.write_all(&bytes).await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;
        trace!(command = %command, bytes = bytes.len(), "Sent command");

        loop {
            if !self.buffer.is_empty() {
                match self.parser.parse(&self.buffer) {
                    Ok(Some((reply, consumed))) => {
                        self.buffer.advance(consumed);
                        self.in_flight = false;
                        trace!(command = command.name(), kind = reply.kind(), "Received reply");
                        return Ok(reply);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        return Err(StoreError::Unavailable(format!("protocol error: {}", e)))
                    }
                }
            }

            if self.buffer.capacity() - self.buffer.len() < 1024 {
                self.buffer.reserve(INITIAL_BUFFER_SIZE);
            }
            let n = stream.read_buf(&mut self.buffer).await.map_err(io_error)?;
            if n == 0 {
                return Err(StoreError::Unavailable(
                    "connection closed by store".to_string(),
                ));
            }
        }
    }
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("I/O error: {}", e))
}

async fn dial(address: &StoreAddress) -> StoreResult<Box<dyn StoreStream>> {
    debug!(address = %address, "Dialing store");
    match address {
        StoreAddress::Tcp(addr) => {
            let stream = TcpStream::connect(addr.as_str()).await.map_err(|e| {
                StoreError::Unavailable(format!("cannot connect to {}: {}", addr, e))
            })?;
            stream.set_nodelay(true).map_err(io_error)?;
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        StoreAddress::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await.map_err(|e| {
                StoreError::Unavailable(format!("cannot connect to {}: {}", path.display(), e))
            })?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        StoreAddress::Unix(path) => Err(StoreError::Unavailable(format!(
            "unix sockets are not supported on this platform: {}",
            path.display()
        ))),
    }
}
