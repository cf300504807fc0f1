//! RESP Protocol Implementation
//!
//! The backing key-value store speaks the Redis Serialization Protocol (RESP).
//! webstore is a client of that store: it encodes commands as RESP arrays of
//! bulk strings and parses the replies that come back.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Incremental parser for replies arriving on the store connection
//!
//! ## Example
//!
//! ```
//! use webstore::protocol::{parse_message, RespValue};
//!
//! let command = RespValue::command(["GET", "IPS:10.0.0.7"]);
//! assert_eq!(command.serialize(), b"*2\r\n$3\r\nGET\r\n$12\r\nIPS:10.0.0.7\r\n");
//!
//! let (reply, consumed) = parse_message(b"$-1\r\n").unwrap().unwrap();
//! assert!(reply.is_null());
//! assert_eq!(consumed, 5);
//! ```

pub mod parser;
pub mod types;

pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
