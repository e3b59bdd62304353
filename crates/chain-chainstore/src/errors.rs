use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainStoreError {
    #[error("trie error: {0}")]
    Trie(#[from] chain_trie::TrieError),

    #[error("rlp error decoding stored record: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("kv store error: {0}")]
    Kv(String),

    #[error("no block composed yet")]
    NoCurrentBlock,

    #[error("transaction not found")]
    TransactionNotFound,
}
