//! RLP decoding over fixed-capacity byte buffers.
//!
//! Ethereum trie nodes are RLP lists whose geometry is bounded: a node is
//! never larger than 532 bytes, so no payload length ever needs more than a
//! two-byte prefix, and no list ever holds more than 17 fields. The decoders
//! here exploit those bounds: they classify headers, produce a fixed
//! parallel-array field table for lists, and never allocate.
//!
//! Decoded offsets always index into the buffer handed to the decoder. For
//! string fields the recorded offset points at the first payload byte; for
//! nested list fields it points at the nested header and the recorded length
//! includes that header, so the recorded window is the complete nested RLP.

use std::fmt::{self, Display};

use thiserror::Error;

/// Maximum supported width of a multi-byte RLP length prefix. Two bytes
/// cover every payload up to 65535 bytes, far beyond the largest trie node.
pub const MAX_LEN_IN_BYTES: usize = 2;

/// Field capacity of an Ethereum branch node: 16 children plus the value
/// slot.
pub const MAX_NUM_FIELDS: usize = 17;

/// Stores the result of RLP decoding. Returns a [`RlpDecodeError`] upon
/// failure.
pub type RlpDecodeResult<T> = Result<T, RlpDecodeError>;

/// An error type for malformed RLP.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum RlpDecodeError {
    /// The input buffer was empty.
    #[error("Tried to decode an RLP header from an empty buffer!")]
    EmptyInput,

    /// A long-form length prefix was wider than [`MAX_LEN_IN_BYTES`].
    #[error("RLP length prefix spans {0} bytes, which is more than the supported maximum of 2!")]
    LengthPrefixTooLong(usize),

    /// A long-form length prefix ran past the end of the input.
    #[error("RLP length prefix needs {needed} bytes but the input only holds {available}!")]
    LengthPrefixOutOfBounds {
        /// Bytes the prefix claims to span (header byte included).
        needed: usize,
        /// Bytes actually present in the input.
        available: usize,
    },

    /// A payload ran past the end of the containing buffer.
    #[error("RLP payload ends at byte {end} but the input only holds {len} bytes!")]
    PayloadOutOfBounds {
        /// One past the last byte the payload claims.
        end: usize,
        /// Length of the input buffer.
        len: usize,
    },

    /// The decoded object was a string where a list was required, or vice
    /// versa.
    #[error("Expected an RLP {expected}, but found a {found}!")]
    UnexpectedDataType {
        /// The data type the caller required.
        expected: RlpDataType,
        /// The data type the header actually encodes.
        found: RlpDataType,
    },

    /// A list held more fields than the decoder's capacity.
    #[error("RLP list holds more than {0} fields!")]
    TooManyListFields(usize),

    /// A list element claimed bytes beyond the end of the list payload.
    #[error("RLP list field {field} ends at byte {end} but the list payload ends at byte {payload_end}!")]
    ListPayloadOverrun {
        /// Index of the offending field.
        field: usize,
        /// One past the last byte the field claims.
        end: usize,
        /// One past the last payload byte of the enclosing list.
        payload_end: usize,
    },

    /// The small-list fast path met an item that is not a short string.
    #[error("List item with prefix {0:#04x} is not a short string with a single-byte header!")]
    NonSmallStringItem(u8),
}

/// Whether an RLP payload encodes a string or a list.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RlpDataType {
    /// A byte string.
    String,
    /// A list of further RLP items.
    List,
}

impl Display for RlpDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RlpDataType::String => "string",
            RlpDataType::List => "list",
        };

        write!(f, "{}", s)
    }
}

/// A decoded RLP header: where the payload starts, how long it is, and what
/// it encodes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RlpHeader {
    /// Byte index at which the payload starts within the input.
    pub offset: usize,
    /// Byte length of the payload.
    pub length: usize,
    /// Whether the payload is a string or a list.
    pub data_type: RlpDataType,
}

impl RlpHeader {
    /// One past the last payload byte, i.e. the full framed length of the
    /// encoded item.
    pub const fn payload_end(&self) -> usize {
        self.offset + self.length
    }
}

/// Field table for a decoded RLP list with up to `F` fields.
///
/// The arrays are parallel: field `i` occupies
/// `input[offsets[i]..offsets[i] + lengths[i]]`. Slots at or beyond
/// [`num_fields`](Self::num_fields) are zeroed.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RlpList<const F: usize> {
    /// Payload offset of each field (nested-header offset for list fields).
    pub offsets: [usize; F],
    /// Payload length of each field (header included for list fields).
    pub lengths: [usize; F],
    /// Data type of each field.
    pub data_types: [RlpDataType; F],
    /// Number of fields actually present.
    pub num_fields: usize,
}

impl<const F: usize> Default for RlpList<F> {
    fn default() -> Self {
        Self {
            offsets: [0; F],
            lengths: [0; F],
            data_types: [RlpDataType::String; F],
            num_fields: 0,
        }
    }
}

/// Classifies the RLP prefix at the start of `input`.
///
/// Only reads the header bytes; the payload itself is not bounds-checked
/// here (see [`decode_string`] and [`decode_list`] for that).
pub fn decode_header(input: &[u8]) -> RlpDecodeResult<RlpHeader> {
    let prefix = *input.first().ok_or(RlpDecodeError::EmptyInput)?;

    let header = match prefix {
        // A single byte below 0x80 is its own payload.
        0x00..=0x7f => RlpHeader {
            offset: 0,
            length: 1,
            data_type: RlpDataType::String,
        },
        0x80..=0xb7 => RlpHeader {
            offset: 1,
            length: (prefix - 0x80) as usize,
            data_type: RlpDataType::String,
        },
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            RlpHeader {
                offset: 1 + len_of_len,
                length: read_length(input, len_of_len)?,
                data_type: RlpDataType::String,
            }
        }
        0xc0..=0xf7 => RlpHeader {
            offset: 1,
            length: (prefix - 0xc0) as usize,
            data_type: RlpDataType::List,
        },
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            RlpHeader {
                offset: 1 + len_of_len,
                length: read_length(input, len_of_len)?,
                data_type: RlpDataType::List,
            }
        }
    };

    Ok(header)
}

/// Big-endian read of a `len_of_len`-byte payload length following the
/// prefix byte.
fn read_length(input: &[u8], len_of_len: usize) -> RlpDecodeResult<usize> {
    if len_of_len > MAX_LEN_IN_BYTES {
        return Err(RlpDecodeError::LengthPrefixTooLong(len_of_len));
    }

    if input.len() < 1 + len_of_len {
        return Err(RlpDecodeError::LengthPrefixOutOfBounds {
            needed: 1 + len_of_len,
            available: input.len(),
        });
    }

    let mut length = 0;
    for b in &input[1..1 + len_of_len] {
        length = (length << 8) | *b as usize;
    }

    Ok(length)
}

/// Decodes the header of a single RLP string and bounds-checks its payload.
///
/// The returned header's `offset` and `length` delimit the string payload
/// within `input`.
pub fn decode_string(input: &[u8]) -> RlpDecodeResult<RlpHeader> {
    let header = decode_header(input)?;

    if header.data_type != RlpDataType::String {
        return Err(RlpDecodeError::UnexpectedDataType {
            expected: RlpDataType::String,
            found: header.data_type,
        });
    }

    check_payload_bounds(&header, input.len())?;

    Ok(header)
}

/// Decodes an RLP list into a field table of capacity `F`.
///
/// String fields are recorded by payload offset and length; nested list
/// fields are recorded by the offset of their own header with the header
/// bytes counted in the length, so the recorded window is the complete
/// nested encoding. Errors if the list holds more than `F` fields or if any
/// field crosses the end of the list payload.
pub fn decode_list<const F: usize>(input: &[u8]) -> RlpDecodeResult<RlpList<F>> {
    let header = decode_list_header(input)?;
    let payload_end = header.payload_end();

    let mut list = RlpList::default();
    let mut pos = header.offset;

    while pos < payload_end {
        if list.num_fields == F {
            return Err(RlpDecodeError::TooManyListFields(F));
        }

        // Clamp the view to the payload so an item header cannot read past
        // the end of the enclosing list.
        let item = decode_header(&input[pos..payload_end])?;
        let i = list.num_fields;

        match item.data_type {
            RlpDataType::String => {
                list.offsets[i] = pos + item.offset;
                list.lengths[i] = item.length;
            }
            RlpDataType::List => {
                list.offsets[i] = pos;
                list.lengths[i] = item.payload_end();
            }
        }
        list.data_types[i] = item.data_type;

        let end = pos + item.payload_end();
        if end > payload_end {
            return Err(RlpDecodeError::ListPayloadOverrun {
                field: i,
                end,
                payload_end,
            });
        }

        list.num_fields += 1;
        pos = end;
    }

    Ok(list)
}

/// [`decode_list`] restricted to items that are strings with a single-byte
/// header (`prefix < 0xb8`, so payloads of at most 55 bytes).
///
/// Every slot of a branch node and every field of an extension node is
/// either empty or a 32-byte child hash, which makes this the right decoder
/// for every internal node of an Ethereum trie proof.
pub fn decode_small_list<const F: usize>(input: &[u8]) -> RlpDecodeResult<RlpList<F>> {
    let header = decode_list_header(input)?;
    let payload_end = header.payload_end();

    let mut list = RlpList::default();
    let mut pos = header.offset;

    while pos < payload_end {
        if list.num_fields == F {
            return Err(RlpDecodeError::TooManyListFields(F));
        }

        let prefix = input[pos];
        let (offset, length) = match prefix {
            0x00..=0x7f => (pos, 1),
            0x80..=0xb7 => (pos + 1, (prefix - 0x80) as usize),
            _ => return Err(RlpDecodeError::NonSmallStringItem(prefix)),
        };

        let end = offset + length;
        if end > payload_end {
            return Err(RlpDecodeError::ListPayloadOverrun {
                field: list.num_fields,
                end,
                payload_end,
            });
        }

        let i = list.num_fields;
        list.offsets[i] = offset;
        list.lengths[i] = length;
        list.num_fields += 1;
        pos = end;
    }

    Ok(list)
}

fn decode_list_header(input: &[u8]) -> RlpDecodeResult<RlpHeader> {
    let header = decode_header(input)?;

    if header.data_type != RlpDataType::List {
        return Err(RlpDecodeError::UnexpectedDataType {
            expected: RlpDataType::List,
            found: header.data_type,
        });
    }

    check_payload_bounds(&header, input.len())?;

    Ok(header)
}

fn check_payload_bounds(header: &RlpHeader, input_len: usize) -> RlpDecodeResult<()> {
    let end = header.payload_end();
    match end <= input_len {
        true => Ok(()),
        false => Err(RlpDecodeError::PayloadOutOfBounds {
            end,
            len: input_len,
        }),
    }
}
