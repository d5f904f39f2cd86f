//! Resolution of single decoded trie nodes against a key path.
//!
//! A trie node is either a branch (17-field list: 16 child slots indexed by
//! nibble plus a value slot) or a leaf/extension (2-field list: a hex-prefix
//! path fragment and either a terminal value or a child hash). The resolvers
//! here consume the node's RLP field table, advance the nibble cursor, and
//! hand back either the next child hash or the terminal value.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::{
    nibbles::{decode_hex_prefix, HexPrefixError, Nibble, KEY_LENGTH, NIBBLE_LENGTH},
    rlp_decode::{RlpList, MAX_NUM_FIELDS},
    utils::eq_at,
};

/// Stores the result of resolving a trie node. Returns a [`NodeError`] upon
/// failure.
pub type NodeResult<T> = Result<T, NodeError>;

/// An error type for trie node resolution.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum NodeError {
    /// The leaf/extension path fragment could not be decoded.
    #[error(transparent)]
    HexPrefix(#[from] HexPrefixError),

    /// The node is neither a branch nor a leaf/extension.
    #[error("Node has {0} fields; trie nodes have either 2 or 17!")]
    UnsupportedShape(usize),

    /// The path fragment disagrees with the key nibbles it covers.
    #[error("Leaf/extension path nibbles do not match the key at nibble window [{start}, {end})!")]
    PathMismatch {
        /// First key nibble the fragment claims to match.
        start: usize,
        /// One past the last key nibble the fragment claims to match.
        end: usize,
    },

    /// The node consumes more nibbles than the key has left.
    #[error("Node path runs past the end of the key (cursor: {cursor}, nibbles consumed: {count})!")]
    PathOverflow {
        /// Nibble cursor before resolving this node.
        cursor: usize,
        /// Nibbles the node tried to consume.
        count: usize,
    },

    /// A branch child slot is neither empty nor a 32-byte hash.
    #[error("Branch slot {slot} holds {len} bytes; a slot holds either nothing or a 32-byte child hash!")]
    BranchSlotShape {
        /// Index of the offending slot.
        slot: usize,
        /// Its decoded length.
        len: usize,
    },

    /// The 17th branch slot holds a value.
    #[error("Branch value slot is not empty ({0} bytes); a fixed-length key cannot terminate at a branch!")]
    BranchValueSlotNonEmpty(usize),

    /// The branch slot selected by the next key nibble is empty.
    #[error("Branch slot {0:#x} selected by the next key nibble is empty!")]
    EmptyBranchSlot(Nibble),

    /// An extension's child is not a 32-byte hash.
    #[error("Extension child is {0} bytes; inline (unhashed) children are not emitted by eth_getProof!")]
    InlineChild(usize),

    /// A leaf node appeared before the final proof window.
    #[error("Encountered a leaf node before the end of the proof path!")]
    UnexpectedLeaf,
}

/// Trie node classification.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeType {
    /// 17-field internal node with one child slot per nibble.
    Branch,
    /// 2-field internal node carrying a shared path fragment.
    Extension,
    /// 2-field terminal node carrying the value.
    Leaf,
}

impl Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Branch => "Branch",
            NodeType::Extension => "Extension",
            NodeType::Leaf => "Leaf",
        };

        write!(f, "{}", s)
    }
}

/// Resolves a 2-field (leaf or extension) node.
///
/// Decodes the hex-prefix path fragment in the first field, checks it
/// against the key nibbles starting at `cursor`, and advances the cursor
/// over it. Returns the node type read off the terminator bit and the raw
/// second field: the terminal value for a leaf, the child hash for an
/// extension.
pub fn resolve_leaf_or_extension<'a>(
    node: &'a [u8],
    list: &RlpList<MAX_NUM_FIELDS>,
    path: &[Nibble; NIBBLE_LENGTH],
    cursor: &mut usize,
) -> NodeResult<(NodeType, &'a [u8])> {
    if list.num_fields != 2 {
        return Err(NodeError::UnsupportedShape(list.num_fields));
    }

    let fragment =
        decode_hex_prefix(&node[list.offsets[0]..list.offsets[0] + list.lengths[0]])?;

    if *cursor + fragment.count > NIBBLE_LENGTH {
        return Err(NodeError::PathOverflow {
            cursor: *cursor,
            count: fragment.count,
        });
    }

    if !eq_at(&fragment.nibbles, path, fragment.count, *cursor) {
        return Err(NodeError::PathMismatch {
            start: *cursor,
            end: *cursor + fragment.count,
        });
    }

    *cursor += fragment.count;

    let value = &node[list.offsets[1]..list.offsets[1] + list.lengths[1]];
    let node_type = match fragment.is_leaf {
        true => NodeType::Leaf,
        false => NodeType::Extension,
    };

    Ok((node_type, value))
}

/// Resolves a 17-field (branch) node.
///
/// Checks every child slot is either empty or a 32-byte hash and that the
/// value slot is empty, then extracts the child hash selected by the key
/// nibble at `cursor` and advances the cursor by one.
pub fn resolve_branch<'a>(
    node: &'a [u8],
    list: &RlpList<MAX_NUM_FIELDS>,
    path: &[Nibble; NIBBLE_LENGTH],
    cursor: &mut usize,
) -> NodeResult<&'a [u8]> {
    if list.num_fields != MAX_NUM_FIELDS {
        return Err(NodeError::UnsupportedShape(list.num_fields));
    }

    for slot in 0..MAX_NUM_FIELDS - 1 {
        let len = list.lengths[slot];
        if len != 0 && len != KEY_LENGTH {
            return Err(NodeError::BranchSlotShape { slot, len });
        }
    }

    if list.lengths[MAX_NUM_FIELDS - 1] != 0 {
        return Err(NodeError::BranchValueSlotNonEmpty(
            list.lengths[MAX_NUM_FIELDS - 1],
        ));
    }

    if *cursor >= NIBBLE_LENGTH {
        return Err(NodeError::PathOverflow {
            cursor: *cursor,
            count: 1,
        });
    }

    let nibble = path[*cursor];
    let slot = nibble as usize;
    if list.lengths[slot] == 0 {
        return Err(NodeError::EmptyBranchSlot(nibble));
    }

    *cursor += 1;

    Ok(&node[list.offsets[slot]..list.offsets[slot] + KEY_LENGTH])
}

/// Resolves an internal node of either shape, returning its type and the
/// 32-byte hash of the next node on the path.
///
/// A leaf is rejected here: internal positions on the proof path cannot
/// terminate.
pub fn resolve_child<'a>(
    node: &'a [u8],
    list: &RlpList<MAX_NUM_FIELDS>,
    path: &[Nibble; NIBBLE_LENGTH],
    cursor: &mut usize,
) -> NodeResult<(NodeType, &'a [u8])> {
    match list.num_fields {
        MAX_NUM_FIELDS => {
            let child = resolve_branch(node, list, path, cursor)?;
            Ok((NodeType::Branch, child))
        }
        2 => {
            let (node_type, child) = resolve_leaf_or_extension(node, list, path, cursor)?;

            if node_type == NodeType::Leaf {
                return Err(NodeError::UnexpectedLeaf);
            }
            if child.len() != KEY_LENGTH {
                return Err(NodeError::InlineChild(child.len()));
            }

            Ok((node_type, child))
        }
        n => Err(NodeError::UnsupportedShape(n)),
    }
}
