use chain_crypto::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error("trie node {0:?} referenced but not present in storage")]
    NodeNotFound(Hash),

    #[error("malformed trie node encoding: {0}")]
    Malformed(String),

    #[error("storage backend error: {0}")]
    Storage(String),
}

impl From<rlp::DecoderError> for TrieError {
    fn from(e: rlp::DecoderError) -> Self {
        TrieError::Malformed(e.to_string())
    }
}
