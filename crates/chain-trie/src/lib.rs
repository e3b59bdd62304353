//! Incremental Patricia Merkle trie over Blake2b-256 hashes and RLP-encoded
//! nodes. Mutations are incremental (no full rebuild on every write) and
//! short (<32 byte) subtrees stay inlined in their parent rather than being
//! stored and referenced by hash.

pub mod db;
pub mod errors;
pub mod nibbles;
pub mod node;
pub mod trie;

pub use db::{KvTrieDb, TrieDb};
pub use errors::TrieError;
pub use node::{Node, NodeRef};
pub use trie::Trie;
