//! Z85 alphabet, payload validation and the padded encoding used by the
//! posting tool.
//!
//! Z85 maps every 4 input bytes to 5 printable characters. Plain Z85 needs
//! input in multiples of 4, so the posting tool prefixes one character with
//! the number of zero bytes (`0`-`3`) it appended before encoding.

use thiserror::Error;

/// The 85 characters a stored payload may consist of.
pub const ALPHABET: &[u8; 85] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

/// Sentinel in [`DECODE`] for bytes outside the alphabet.
const INVALID: u8 = 0xff;

/// Byte to digit lookup, built at compile time.
const DECODE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Z85Error {
    #[error("invalid character {byte:#04x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },

    #[error("encoded length {0} is not a multiple of 5")]
    InvalidLength(usize),

    #[error("invalid padding marker")]
    InvalidPadding,

    #[error("block at offset {0} overflows 32 bits")]
    Overflow(usize),
}

/// Payload Validator: true iff every byte belongs to the Z85 alphabet.
///
/// Empty input is valid here; the minimum length is enforced by the caller.
#[inline]
pub fn is_valid(data: &[u8]) -> bool {
    data.iter().all(|&b| DECODE[b as usize] != INVALID)
}

/// Standard Z85 encoding. `data.len()` must be a multiple of 4.
pub fn encode(data: &[u8]) -> Option<String> {
    if data.len() % 4 != 0 {
        return None;
    }

    let mut out = String::with_capacity(data.len() / 4 * 5);
    for chunk in data.chunks_exact(4) {
        let mut value = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let mut block = [0u8; 5];
        for slot in block.iter_mut().rev() {
            *slot = ALPHABET[(value % 85) as usize];
            value /= 85;
        }
        out.extend(block.iter().map(|&b| b as char));
    }
    Some(out)
}

/// Standard Z85 decoding.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>, Z85Error> {
    if encoded.len() % 5 != 0 {
        return Err(Z85Error::InvalidLength(encoded.len()));
    }

    let mut out = Vec::with_capacity(encoded.len() / 5 * 4);
    for (index, chunk) in encoded.chunks_exact(5).enumerate() {
        let offset = index * 5;
        let mut value: u64 = 0;
        for (i, &byte) in chunk.iter().enumerate() {
            let digit = DECODE[byte as usize];
            if digit == INVALID {
                return Err(Z85Error::InvalidCharacter {
                    byte,
                    offset: offset + i,
                });
            }
            value = value * 85 + u64::from(digit);
        }
        let value = u32::try_from(value).map_err(|_| Z85Error::Overflow(offset))?;
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(out)
}

/// Encodes arbitrary-length data: padding marker followed by Z85.
///
/// ```
/// use webstore::codec::z85;
/// let encoded = z85::encode_padded(b"hello");
/// assert_eq!(z85::decode_padded(encoded.as_bytes()).unwrap(), b"hello");
/// ```
pub fn encode_padded(data: &[u8]) -> String {
    let padding = (4 - data.len() % 4) % 4;
    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding, 0);

    let mut out = String::with_capacity(1 + padded.len() / 4 * 5);
    out.push(char::from(b'0' + padding as u8));
    // Length is a multiple of 4 by construction.
    out.push_str(&encode(&padded).unwrap_or_default());
    out
}

/// Reverses [`encode_padded`].
pub fn decode_padded(encoded: &[u8]) -> Result<Vec<u8>, Z85Error> {
    let (&marker, body) = encoded.split_first().ok_or(Z85Error::InvalidPadding)?;
    let padding = match marker {
        b'0'..=b'3' => usize::from(marker - b'0'),
        _ => return Err(Z85Error::InvalidPadding),
    };

    let mut data = decode(body)?;
    if padding > data.len() || data[data.len() - padding..].iter().any(|&b| b != 0) {
        return Err(Z85Error::InvalidPadding);
    }
    data.truncate(data.len() - padding);
    Ok(data)
}
