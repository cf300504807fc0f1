//! Command construction and reply interpretation.

use crate::protocol::RespValue;
use crate::storage::{StoreError, StoreResult};
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// A command the service sends to its backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Bytes,
        ttl: Option<Duration>,
    },
    Incr {
        key: String,
    },
    Ping,
    Auth {
        password: String,
    },
}

impl Command {
    pub fn get(key: impl Into<String>) -> Self {
        Command::Get { key: key.into() }
    }

    pub fn set(key: impl Into<String>, value: Bytes, ttl: Option<Duration>) -> Self {
        Command::Set {
            key: key.into(),
            value,
            ttl,
        }
    }

    pub fn incr(key: impl Into<String>) -> Self {
        Command::Incr { key: key.into() }
    }

    /// The command name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Incr { .. } => "INCR",
            Command::Ping => "PING",
            Command::Auth { .. } => "AUTH",
        }
    }

    /// Encodes the command as a RESP array of bulk strings.
    ///
    /// A TTL is sent in whole seconds and never as zero, since the store
    /// rejects `EX 0`.
    pub fn to_resp(&self) -> RespValue {
        match self {
            Command::Get { key } => RespValue::command([
                Bytes::from_static(b"GET"),
                Bytes::copy_from_slice(key.as_bytes()),
            ]),
            Command::Set { key, value, ttl } => {
                let mut parts = vec![
                    Bytes::from_static(b"SET"),
                    Bytes::copy_from_slice(key.as_bytes()),
                    value.clone(),
                ];
                if let Some(ttl) = ttl {
                    parts.push(Bytes::from_static(b"EX"));
                    parts.push(Bytes::from(ttl.as_secs().max(1).to_string()));
                }
                RespValue::command(parts)
            }
            Command::Incr { key } => RespValue::command([
                Bytes::from_static(b"INCR"),
                Bytes::copy_from_slice(key.as_bytes()),
            ]),
            Command::Ping => RespValue::command([Bytes::from_static(b"PING")]),
            Command::Auth { password } => RespValue::command([
                Bytes::from_static(b"AUTH"),
                Bytes::copy_from_slice(password.as_bytes()),
            ]),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get { key } | Command::Incr { key } => write!(f, "{} {}", self.name(), key),
            Command::Set { key, value, ttl } => {
                write!(f, "SET {} <{} bytes>", key, value.len())?;
                if let Some(ttl) = ttl {
                    write!(f, " EX {}", ttl.as_secs().max(1))?;
                }
                Ok(())
            }
            // Never print the password.
            Command::Auth { .. } => write!(f, "AUTH ***"),
            Command::Ping => write!(f, "PING"),
        }
    }
}

/// Interprets a `GET` reply.
///
/// A string is a hit and nil is a miss. An error reply (`WRONGTYPE`, ...)
/// is `Rejected`, any other shape `UnexpectedReply`, so a caller that must
/// fail closed can tell them apart from a miss.
pub fn bulk_reply(reply: RespValue) -> StoreResult<Option<Bytes>> {
    match reply {
        RespValue::BulkString(data) => Ok(Some(data)),
        RespValue::SimpleString(s) => Ok(Some(Bytes::from(s))),
        RespValue::Null => Ok(None),
        RespValue::Error(e) => Err(StoreError::Rejected(e)),
        other => Err(StoreError::UnexpectedReply {
            command: "GET",
            kind: other.kind(),
        }),
    }
}

/// Interprets a reply that must be a success status (`+OK` or `+PONG`).
pub fn status_reply(command: &'static str, reply: RespValue) -> StoreResult<()> {
    match reply {
        RespValue::SimpleString(_) => Ok(()),
        RespValue::Error(e) => Err(StoreError::Rejected(e)),
        other => Err(StoreError::UnexpectedReply {
            command,
            kind: other.kind(),
        }),
    }
}

/// Interprets a reply that must be an integer (`INCR`).
pub fn integer_reply(command: &'static str, reply: RespValue) -> StoreResult<i64> {
    match reply {
        RespValue::Integer(n) => Ok(n),
        RespValue::Error(e) => Err(StoreError::Rejected(e)),
        other => Err(StoreError::UnexpectedReply {
            command,
            kind: other.kind(),
        }),
    }
}
