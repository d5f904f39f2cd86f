use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use eth_trie::{EthTrie, MemoryDB, Trie};
use ethereum_types::{H256, U256};
use keccak_hash::keccak;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rlp_derive::RlpEncodable;

use crate::{
    nibbles::Nibble,
    proof::{StateProof, StorageProof, TrieProof, MAX_TRIE_NODE_LENGTH},
    utils::byte_value,
};

/// Proof buffer capacity used throughout the tests: eight node windows,
/// comfortably above the depth of any trie the tests build.
pub(crate) const TEST_PROOF_LEN: usize = MAX_TRIE_NODE_LENGTH * 8;

pub(crate) type TestStorageProof = StorageProof<{ TEST_PROOF_LEN }>;
pub(crate) type TestStateProof = StateProof<{ TEST_PROOF_LEN }>;

pub(crate) type TestSlotValueEntry = ([u8; 32], [u8; 32]);

/// Eth test account entry. As a separate struct to allow easy RLP encoding.
#[derive(Clone, Debug, RlpEncodable)]
pub(crate) struct AccountEntry {
    pub(crate) nonce: u64,
    pub(crate) balance: U256,
    pub(crate) storage_root: H256,
    pub(crate) code_hash: H256,
}

impl AccountEntry {
    pub(crate) fn with_balance(balance: u64) -> Self {
        Self {
            nonce: 1,
            balance: balance.into(),
            storage_root: keccak_hash::KECCAK_NULL_RLP,
            code_hash: keccak_hash::KECCAK_EMPTY,
        }
    }
}

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

pub(crate) fn create_truth_trie() -> EthTrie<MemoryDB> {
    let db = Arc::new(MemoryDB::new(true));
    EthTrie::new(db)
}

/// The trie libs re-export the same hash type from different crate
/// versions; going through the raw bytes sidesteps the mismatch.
pub(crate) fn lib_hash_to_h256(h: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(h.as_ref())
}

/// Encodes a nibble sequence under hex-prefix encoding; the inverse of the
/// production decoder.
pub(crate) fn hex_prefix_encode(nibbles: &[Nibble], is_leaf: bool) -> Bytes {
    let is_odd = nibbles.len() % 2 == 1;
    let flags = ((is_leaf as u8) << 1) | is_odd as u8;

    let (first, rest) = match is_odd {
        true => (nibbles[0], &nibbles[1..]),
        false => (0, nibbles),
    };

    let mut bytes = BytesMut::with_capacity(1 + rest.len() / 2);
    bytes.put_u8((flags << 4) | first);
    for pair in rest.chunks(2) {
        bytes.put_u8((pair[0] << 4) | pair[1]);
    }

    bytes.freeze()
}

/// Right-pads each proof node into its own 532-byte window, returning the
/// packed buffer and the node count.
pub(crate) fn pack_proof_nodes<const PROOF_LEN: usize>(
    nodes: &[Vec<u8>],
) -> ([u8; PROOF_LEN], usize) {
    assert!(
        nodes.len() * MAX_TRIE_NODE_LENGTH <= PROOF_LEN,
        "test proof buffer too small for {} nodes",
        nodes.len()
    );

    let mut buf = [0; PROOF_LEN];
    for (i, node) in nodes.iter().enumerate() {
        assert!(node.len() <= MAX_TRIE_NODE_LENGTH);
        let start = i * MAX_TRIE_NODE_LENGTH;
        buf[start..start + node.len()].copy_from_slice(node);
    }

    (buf, nodes.len())
}

/// Left-pads `bytes` into an `N`-byte buffer (significant bytes right
/// aligned), the layout the verifier expects for values.
pub(crate) fn left_pad<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out[N - bytes.len()..].copy_from_slice(bytes);

    out
}

/// The canonical storage-trie encoding of a 32-byte slot value: leading
/// zeros stripped, then RLP string encoded.
pub(crate) fn storage_value_rlp(value: &[u8; 32]) -> Vec<u8> {
    let (stripped, len) = byte_value(value);

    rlp::encode(&&stripped[..len]).to_vec()
}

/// Builds a storage trie keyed the way Ethereum keys them: entries live at
/// `keccak256(slot)` and hold the RLP of their significant bytes.
pub(crate) fn storage_trie_with_entries(entries: &[TestSlotValueEntry]) -> EthTrie<MemoryDB> {
    let mut trie = create_truth_trie();
    for (slot, value) in entries {
        trie.insert(keccak(slot).as_bytes(), &storage_value_rlp(value))
            .unwrap();
    }

    trie
}

/// Assembles the fixed-layout storage proof for `slot` out of the ground
/// truth trie.
pub(crate) fn storage_proof_from_trie(
    trie: &mut EthTrie<MemoryDB>,
    slot: [u8; 32],
    value: [u8; 32],
) -> TestStorageProof {
    let nodes = trie.get_proof(keccak(&slot).as_bytes()).unwrap();
    let (proof, depth) = pack_proof_nodes(&nodes);

    TrieProof {
        key: slot,
        proof,
        depth,
        value,
    }
}

/// Builds a state trie over `(address, account)` pairs, keyed by hashed
/// address.
pub(crate) fn state_trie_with_accounts(
    accounts: &[([u8; 20], AccountEntry)],
) -> EthTrie<MemoryDB> {
    let mut trie = create_truth_trie();
    for (address, account) in accounts {
        trie.insert(keccak(address).as_bytes(), &rlp::encode(account))
            .unwrap();
    }

    trie
}

/// Assembles the fixed-layout state proof for `address` out of the ground
/// truth trie.
pub(crate) fn state_proof_from_trie(
    trie: &mut EthTrie<MemoryDB>,
    address: [u8; 20],
    account: &AccountEntry,
) -> TestStateProof {
    let nodes = trie.get_proof(keccak(&address).as_bytes()).unwrap();
    let (proof, depth) = pack_proof_nodes(&nodes);

    TrieProof {
        key: address,
        proof,
        depth,
        value: left_pad(&rlp::encode(account)),
    }
}

pub(crate) fn generate_n_random_slot_value_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestSlotValueEntry> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n).map(move |_| {
        let slot: [u8; 32] = rng.gen();
        let mut value: [u8; 32] = rng.gen();
        // A zero slot value would never be stored in the trie at all.
        value[31] |= 1;

        (slot, value)
    })
}

pub(crate) fn generate_n_random_account_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = ([u8; 20], AccountEntry)> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n).map(move |_| {
        let address: [u8; 20] = rng.gen();
        let account = AccountEntry {
            nonce: rng.gen_range(0..1_000_000),
            balance: U256::from(rng.gen::<u128>()),
            storage_root: H256(rng.gen()),
            code_hash: H256(rng.gen()),
        };

        (address, account)
    })
}
