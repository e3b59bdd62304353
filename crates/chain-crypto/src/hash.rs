use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// 32-byte digest used throughout the chain: node hashes, tx/block/receipt
/// hashes, method IDs and the signing hash are all Blake2b-256 outputs.
pub type Hash = [u8; 32];

/// All-zero hash. Used as the sentinel "no parent" / "no value" marker,
/// distinct from [`EMPTY_TRIE_ROOT`] which is the hash of an empty trie node.
pub const EMPTY_HASH: Hash = [0u8; 32];

/// Blake2b-256 hash of the RLP encoding of a nil trie value node.
/// This is the root hash of a trie with no entries.
pub const EMPTY_TRIE_ROOT: Hash = [
    0x45, 0xb0, 0xcf, 0xc2, 0x20, 0xce, 0xec, 0x5b, 0x7c, 0x1c, 0x62, 0xc4, 0xd4, 0x19, 0x3d, 0x38,
    0xe4, 0xeb, 0xa4, 0x8e, 0x88, 0x15, 0x72, 0x9c, 0xe7, 0x5f, 0x9c, 0x0a, 0xb0, 0xe4, 0xc1, 0xc0,
];

type Blake2b256 = Blake2b<U32>;

/// Blake2b-256 digest of `data`.
pub fn blake2b_256(data: &[u8]) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    hash
}

/// Blake2b-256 over the concatenation of several byte slices, without
/// allocating an intermediate buffer.
pub fn blake2b_256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let out = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&out);
    hash
}

/// Render a hash as a lowercase `0x`-prefixed hex string.
pub fn hash_to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a hex string (with or without `0x` prefix) into a [`Hash`].
pub fn hash_from_hex(s: &str) -> Result<Hash, hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    let mut hash = [0u8; 32];
    let len = bytes.len().min(32);
    hash[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    Ok(hash)
}
