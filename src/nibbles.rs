//! Nibble paths and hex-prefix ("compact") decoding.
//!
//! A trie key is traversed nibble by nibble, most significant nibble first.
//! Leaf and extension nodes store their path fragment under Ethereum's
//! hex-prefix encoding: the high nibble of the first byte carries a parity
//! bit and a leaf-terminator bit, the rest of the byte string carries the
//! path nibbles packed two per byte.

use thiserror::Error;

use crate::utils::byte_to_nibbles;

// Use a whole byte for a Nibble just for convenience
/// A Nibble has 4 bits and is stored as `u8`.
pub type Nibble = u8;

/// Byte length of a hashed trie key (keccak256 output).
pub const KEY_LENGTH: usize = 32;

/// Nibble length of a hashed trie key path.
pub const NIBBLE_LENGTH: usize = 2 * KEY_LENGTH;

/// Errors encountered when decoding a hex-prefix byte string.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum HexPrefixError {
    /// The encoding was empty.
    #[error("Tried to decode an empty hex prefix byte string!")]
    Empty,

    /// The flag nibble is not one of the four defined values.
    #[error("Tried to decode a hex prefix byte string with invalid flags at the start: {0:#06b}")]
    InvalidFlags(Nibble),

    /// An even-length path carried a non-zero pad nibble.
    #[error("Hex prefix byte string with an even nibble count carries a non-zero pad nibble: {0:#x}")]
    NonZeroPadNibble(Nibble),

    /// The encoding holds more nibbles than a hashed key path.
    #[error("Hex prefix byte string encodes more than 64 nibbles: (bytes: {0}, length: {1})")]
    TooLong(String, usize),
}

/// A decoded hex-prefix path fragment.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathFragment {
    /// The decoded nibbles, left-justified; slots at `count` and beyond are
    /// zero.
    pub nibbles: [Nibble; NIBBLE_LENGTH],

    /// Number of meaningful nibbles.
    pub count: usize,

    /// Whether the terminator bit was set, i.e. the fragment belongs to a
    /// leaf node.
    pub is_leaf: bool,
}

/// Decodes a hex-prefix byte string into a [`PathFragment`].
///
/// The high nibble of the first byte holds the flags: bit 0 is the parity
/// of the nibble count (odd means the low nibble of the first byte is the
/// first path nibble), bit 1 is the leaf terminator.
pub fn decode_hex_prefix(bytes: &[u8]) -> Result<PathFragment, HexPrefixError> {
    let first = *bytes.first().ok_or(HexPrefixError::Empty)?;
    let (flags, low) = byte_to_nibbles(first);

    // is_odd --> 0b01
    // is_leaf --> 0b10
    let (is_leaf, is_odd) = match flags {
        0b00 => (false, false),
        0b01 => (false, true),
        0b10 => (true, false),
        0b11 => (true, true),
        _ => return Err(HexPrefixError::InvalidFlags(flags)),
    };

    let count = (bytes.len() - 1) * 2 + is_odd as usize;
    if count > NIBBLE_LENGTH {
        return Err(HexPrefixError::TooLong(hex::encode(bytes), bytes.len()));
    }

    let mut nibbles = [0; NIBBLE_LENGTH];
    let mut i = 0;

    match is_odd {
        true => {
            nibbles[0] = low;
            i = 1;
        }
        false if low != 0 => return Err(HexPrefixError::NonZeroPadNibble(low)),
        false => (),
    }

    for b in &bytes[1..] {
        let (hi, lo) = byte_to_nibbles(*b);
        nibbles[i] = hi;
        nibbles[i + 1] = lo;
        i += 2;
    }

    Ok(PathFragment {
        nibbles,
        count,
        is_leaf,
    })
}

/// Expands a 32-byte hashed key into its 64-nibble traversal path, most
/// significant nibble first.
pub fn hashed_key_path(hashed_key: &[u8; KEY_LENGTH]) -> [Nibble; NIBBLE_LENGTH] {
    let mut path = [0; NIBBLE_LENGTH];

    for (i, b) in hashed_key.iter().enumerate() {
        let (hi, lo) = byte_to_nibbles(*b);
        path[2 * i] = hi;
        path[2 * i + 1] = lo;
    }

    path
}
