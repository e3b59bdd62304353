use thiserror::Error;

/// State-storage errors. All variants are recoverable from the caller's
/// point of view; genuine corruption (a missing trie node, a malformed
/// account record) surfaces through [`chain_trie::TrieError`] instead and
/// is treated as fatal by the consensus adapter.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("trie error: {0}")]
    Trie(#[from] chain_trie::TrieError),

    #[error("rlp error decoding account record: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("kv store error: {0}")]
    Kv(String),
}
