//! Verification of Ethereum Merkle-Patricia trie inclusion proofs.
//!
//! While there are other Ethereum trie libraries (such as [eth_trie](https://docs.rs/eth_trie/latest/eth_trie)),
//! these libraries are not a good fit if:
//! - You only hold the proof path for a single key, not the trie itself.
//! - You need every buffer to be fixed-capacity and every loop bounded, so
//!   that a verification performs no allocation.
//!
//! The core of this library is the [`TrieProof`][proof::TrieProof] type: the
//! unhashed key, the proof path (one right-padded 532-byte window per trie
//! node, root first), the node count, and the expected terminal value. Its
//! two specialisations, [`StorageProof`][proof::StorageProof] and
//! [`StateProof`][proof::StateProof], decide whether the proof authenticates
//! a storage slot value or an RLP-encoded account record under a given
//! keccak256 root hash.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod nibbles;
pub mod node;
pub mod proof;
pub mod rlp_decode;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing_utils;
