//! Payload and key codecs.
//!
//! - [`z85`]: the 85-symbol payload alphabet, the Payload Validator and the
//!   padded Z85 encoding used by `webstore-post`.
//! - [`key`]: the [`Algorithm`] table (key width, route prefix, digest) and
//!   the Key Codec.

pub mod key;
pub mod z85;

pub use key::{canonicalize, Algorithm, KeyError};
pub use z85::{is_valid as is_valid_payload, Z85Error};

/// Shortest POST body the service accepts.
pub const MIN_PAYLOAD_LEN: usize = 5;
