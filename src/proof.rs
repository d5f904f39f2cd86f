//! Merkle-Patricia trie proof verification.
//!
//! A [`TrieProof`] carries the unhashed key, the proof path as fixed
//! 532-byte node windows in root-to-leaf order, the window count, and the
//! expected terminal value. Verification hashes the key into its nibble
//! path, walks the windows re-hashing each node and chaining the hash
//! extracted from its parent, and finally checks the terminal leaf against
//! the expected value.
//!
//! Every buffer is fixed-capacity and every loop is bounded by the window
//! count, so a verification performs no allocation.

use ethereum_types::H256;
use keccak_hash::keccak;
use log::trace;
use thiserror::Error;

use crate::{
    nibbles::{hashed_key_path, Nibble, NIBBLE_LENGTH},
    node::{self, NodeError, NodeType},
    rlp_decode::{self, RlpDecodeError, RlpList, MAX_NUM_FIELDS},
    utils::{byte_value, subarray},
};

/// Upper bound on the RLP-framed byte length of a single trie node under
/// Ethereum's rules (the worst-case branch node: 17 slots of 32 bytes plus
/// RLP overhead).
pub const MAX_TRIE_NODE_LENGTH: usize = 532;

/// Maximum byte length of a storage slot value.
pub const MAX_STORAGE_VALUE_LENGTH: usize = 32;

/// Worst-case byte length of an RLP-encoded account record (nonce, balance,
/// storage root, code hash), list header included.
pub const MAX_ACCOUNT_STATE_LENGTH: usize = 134;

/// Stores the result of verifying a trie proof. Returns a
/// [`ProofVerifyError`] upon failure.
pub type ProofVerifyResult<T> = Result<T, ProofVerifyError>;

/// An error type for trie proof verification.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum ProofVerifyError {
    /// A node window could not be decoded as RLP.
    #[error(transparent)]
    Rlp(#[from] RlpDecodeError),

    /// A node failed to resolve against the key path.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// The proof buffer capacity is not a positive multiple of the node
    /// window size.
    #[error("Proof capacity of {0} bytes is not a positive multiple of the 532-byte node window!")]
    ProofCapacityNotNodeMultiple(usize),

    /// The declared depth does not fit the proof buffer.
    #[error("Proof depth {depth} does not fit the proof buffer ({max_depth} node windows)!")]
    InvalidDepth {
        /// The declared number of node windows.
        depth: usize,
        /// The number of windows the buffer can hold.
        max_depth: usize,
    },

    /// An internal node hashed to something other than the hash its parent
    /// committed to.
    #[error("Internal node hash does not match the hash extracted from the preceding node! (depth: {0})")]
    InternalNodeHashMismatch(usize),

    /// The terminal node hashed to something other than the hash its parent
    /// committed to.
    #[error("Leaf node hash does not match the hash extracted from the preceding node!")]
    LeafNodeHashMismatch,

    /// The final proof window did not hold a leaf.
    #[error("Terminal node of the proof is a {0} node, not a leaf!")]
    TerminalNodeNotLeaf(NodeType),

    /// The walk ended without consuming the whole key.
    #[error("Proof terminated with the key only partially consumed! (cursor: {0} of 64 nibbles)")]
    KeyNotExhausted(usize),

    /// The leaf holds a value of a different length than expected.
    #[error("Leaf value is {found} bytes long but the expected value has {expected} significant bytes!")]
    ValueLengthMismatch {
        /// Significant byte count of the caller-supplied value.
        expected: usize,
        /// Byte count the leaf actually holds.
        found: usize,
    },

    /// The leaf holds a different value than expected.
    #[error("Leaf value does not match the expected value! (expected: {expected}, found: {found})")]
    ValueMismatch {
        /// Hex rendering of the caller-supplied value.
        expected: String,
        /// Hex rendering of the value the leaf holds.
        found: String,
    },

    /// A state leaf does not carry an RLP list where the account record
    /// belongs.
    #[error("Account record does not start with an RLP list tag! (first byte: {0:#04x})")]
    AccountNotAList(u8),
}

/// A Merkle-Patricia trie inclusion proof for a single fixed-length key.
///
/// `PROOF_LEN` must be a positive multiple of [`MAX_TRIE_NODE_LENGTH`]; the
/// buffer holds `depth` meaningful node windows in root-to-leaf order, each
/// right-padded with zeros, with the remainder of the buffer ignored. The
/// value is left-padded so its significant bytes are right-aligned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrieProof<const KEY_LEN: usize, const PROOF_LEN: usize, const VALUE_LEN: usize> {
    /// The unhashed key; the verifier hashes it with keccak256 to obtain
    /// the 64-nibble traversal path.
    pub key: [u8; KEY_LEN],

    /// `depth` RLP-encoded trie nodes, each right-padded with zero bytes to
    /// its own [`MAX_TRIE_NODE_LENGTH`]-byte window.
    pub proof: [u8; PROOF_LEN],

    /// Number of meaningful node windows in `proof`.
    pub depth: usize,

    /// Expected terminal value, left-padded with zero bytes.
    pub value: [u8; VALUE_LEN],
}

/// An Ethereum storage proof: a 32-byte slot key under an account's storage
/// root, authenticating a value of at most 32 bytes.
pub type StorageProof<const PROOF_LEN: usize> =
    TrieProof<32, PROOF_LEN, { MAX_STORAGE_VALUE_LENGTH }>;

/// An Ethereum state proof: a 20-byte address under a block's state root,
/// authenticating the RLP-encoded account record.
pub type StateProof<const PROOF_LEN: usize> =
    TrieProof<20, PROOF_LEN, { MAX_ACCOUNT_STATE_LENGTH }>;

impl<const KEY_LEN: usize, const PROOF_LEN: usize, const VALUE_LEN: usize>
    TrieProof<KEY_LEN, PROOF_LEN, VALUE_LEN>
{
    const fn max_depth() -> usize {
        PROOF_LEN / MAX_TRIE_NODE_LENGTH
    }

    fn check_layout(&self) -> ProofVerifyResult<()> {
        if PROOF_LEN == 0 || PROOF_LEN % MAX_TRIE_NODE_LENGTH != 0 {
            return Err(ProofVerifyError::ProofCapacityNotNodeMultiple(PROOF_LEN));
        }

        if self.depth == 0 || self.depth > Self::max_depth() {
            return Err(ProofVerifyError::InvalidDepth {
                depth: self.depth,
                max_depth: Self::max_depth(),
            });
        }

        Ok(())
    }

    /// Copies the `i`-th node window out of the proof buffer and returns it
    /// together with its RLP-framed byte length.
    fn node_window(&self, i: usize) -> ProofVerifyResult<([u8; MAX_TRIE_NODE_LENGTH], usize)> {
        let window: [u8; MAX_TRIE_NODE_LENGTH] =
            subarray(&self.proof, i * MAX_TRIE_NODE_LENGTH);

        // The framed length is saturated to the window; a node claiming
        // more bytes than the window holds cannot hash correctly anyway.
        let header = rlp_decode::decode_header(&window)?;
        let framed = header.payload_end().min(MAX_TRIE_NODE_LENGTH);

        Ok((window, framed))
    }

    /// Walks the `depth - 1` internal windows, re-hashing each node and
    /// chaining the hash extracted from its parent. Returns the nibble
    /// cursor and the hash the terminal node must have.
    fn walk_internal(
        &self,
        root: H256,
        path: &[Nibble; NIBBLE_LENGTH],
    ) -> ProofVerifyResult<(usize, H256)> {
        let mut expected_hash = root;
        let mut cursor = 0;

        for level in 0..self.depth - 1 {
            let (window, framed) = self.node_window(level)?;
            let node = &window[..framed];

            if keccak(node) != expected_hash {
                return Err(ProofVerifyError::InternalNodeHashMismatch(level));
            }

            // Internal nodes only carry hashes and empties, so the
            // small-string fast path always applies.
            let list = rlp_decode::decode_small_list::<MAX_NUM_FIELDS>(node)?;
            let (node_type, child) = node::resolve_child(node, &list, path, &mut cursor)?;

            trace!(
                "Resolved {} node at depth {} (cursor: {})",
                node_type,
                level,
                cursor
            );

            expected_hash = H256::from_slice(child);
        }

        Ok((cursor, expected_hash))
    }

    /// Hash-checks the final proof window against the hash extracted from
    /// its parent and returns it.
    fn terminal_window(
        &self,
        expected_hash: H256,
    ) -> ProofVerifyResult<([u8; MAX_TRIE_NODE_LENGTH], usize)> {
        let (window, framed) = self.node_window(self.depth - 1)?;

        if keccak(&window[..framed]) != expected_hash {
            return Err(ProofVerifyError::LeafNodeHashMismatch);
        }

        Ok((window, framed))
    }

    /// Resolves the terminal node, requiring a leaf that consumes the rest
    /// of the key, and returns its value field.
    fn resolve_terminal_leaf<'a>(
        &self,
        node: &'a [u8],
        list: &RlpList<MAX_NUM_FIELDS>,
        path: &[Nibble; NIBBLE_LENGTH],
        cursor: &mut usize,
    ) -> ProofVerifyResult<&'a [u8]> {
        let (node_type, value) = node::resolve_leaf_or_extension(node, list, path, cursor)?;

        if node_type != NodeType::Leaf {
            return Err(ProofVerifyError::TerminalNodeNotLeaf(node_type));
        }

        if *cursor != NIBBLE_LENGTH {
            return Err(ProofVerifyError::KeyNotExhausted(*cursor));
        }

        Ok(value)
    }
}

impl<const PROOF_LEN: usize> TrieProof<32, PROOF_LEN, { MAX_STORAGE_VALUE_LENGTH }> {
    /// Verifies that this proof authenticates `value` at the storage slot
    /// `key` under the given storage root.
    ///
    /// The leaf of a storage trie holds the RLP string encoding of the slot
    /// value with leading zeros stripped; the caller-supplied value is
    /// normalised with [`byte_value`] before the comparison.
    pub fn verify_storage_root(&self, root: H256) -> ProofVerifyResult<()> {
        self.check_layout()?;

        let hashed_key = keccak(&self.key);
        let path = hashed_key_path(&hashed_key.0);

        let (mut cursor, expected_hash) = self.walk_internal(root, &path)?;
        let (window, framed) = self.terminal_window(expected_hash)?;
        let node = &window[..framed];

        // Both leaf fields are short strings here: the hex-prefix path is
        // at most 33 bytes and the encoded value at most 33 bytes.
        let list = rlp_decode::decode_small_list::<MAX_NUM_FIELDS>(node)?;
        let leaf_value = self.resolve_terminal_leaf(node, &list, &path, &mut cursor)?;

        let (value, value_len) = byte_value(&self.value);
        let header = rlp_decode::decode_string(leaf_value)?;

        if header.length != value_len {
            return Err(ProofVerifyError::ValueLengthMismatch {
                expected: value_len,
                found: header.length,
            });
        }

        let found = &leaf_value[header.offset..header.offset + header.length];
        if found != &value[..value_len] {
            return Err(ProofVerifyError::ValueMismatch {
                expected: hex::encode(&value[..value_len]),
                found: hex::encode(found),
            });
        }

        Ok(())
    }
}

impl<const PROOF_LEN: usize> TrieProof<20, PROOF_LEN, { MAX_ACCOUNT_STATE_LENGTH }> {
    /// Verifies that this proof authenticates the RLP-encoded account
    /// record `value` at the address `key` under the given state root.
    pub fn verify_state_root(&self, root: H256) -> ProofVerifyResult<()> {
        self.check_layout()?;

        let hashed_key = keccak(&self.key);
        let path = hashed_key_path(&hashed_key.0);

        let (mut cursor, expected_hash) = self.walk_internal(root, &path)?;
        let (window, framed) = self.terminal_window(expected_hash)?;
        let node = &window[..framed];

        // The account record exceeds 55 bytes, so the leaf's value field
        // carries a multi-byte header and needs the general decoder.
        let list = rlp_decode::decode_list::<MAX_NUM_FIELDS>(node)?;
        let leaf_value = self.resolve_terminal_leaf(node, &list, &path, &mut cursor)?;

        let (value, value_len) = byte_value(&self.value);

        match leaf_value.first() {
            Some(b) if *b >= 0xc0 => (),
            b => return Err(ProofVerifyError::AccountNotAList(b.copied().unwrap_or(0))),
        }

        if leaf_value.len() != value_len {
            return Err(ProofVerifyError::ValueLengthMismatch {
                expected: value_len,
                found: leaf_value.len(),
            });
        }

        if leaf_value != &value[..value_len] {
            return Err(ProofVerifyError::ValueMismatch {
                expected: hex::encode(&value[..value_len]),
                found: hex::encode(leaf_value),
            });
        }

        Ok(())
    }
}
