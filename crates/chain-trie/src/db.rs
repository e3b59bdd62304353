use crate::errors::TrieError;
use chain_crypto::Hash;
use chain_kv::KeyValueStore;
use std::rc::Rc;

/// Storage the trie reads and writes RLP-encoded nodes through, keyed by
/// their Blake2b-256 hash. Decoupled from [`chain_kv::KeyValueStore`] so the
/// trie never has to know about byte-key namespacing.
pub trait TrieDb {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, TrieError>;
    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), TrieError>;
}

/// Adapts any [`KeyValueStore`] into a [`TrieDb`] by namespacing node hashes
/// under a fixed key prefix, so trie nodes never collide with whatever else
/// shares the same underlying store. Holds the store behind an [`Rc`] rather
/// than a borrow so a [`crate::trie::Trie`] built on top can be stored
/// long-lived (e.g. inside an account) without threading a lifetime through
/// every structure that ends up owning one.
pub struct KvTrieDb<S: KeyValueStore + ?Sized> {
    store: Rc<S>,
    prefix: &'static [u8],
}

impl<S: KeyValueStore + ?Sized> KvTrieDb<S> {
    pub fn new(store: Rc<S>, prefix: &'static [u8]) -> Self {
        Self { store, prefix }
    }

    fn key(&self, hash: &Hash) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + 32);
        key.extend_from_slice(self.prefix);
        key.extend_from_slice(hash);
        key
    }
}

impl<S: KeyValueStore + ?Sized> TrieDb for KvTrieDb<S> {
    fn get_node(&self, hash: &Hash) -> Result<Option<Vec<u8>>, TrieError> {
        self.store
            .get(&self.key(hash))
            .map_err(|e| TrieError::Storage(e.to_string()))
    }

    fn put_node(&self, hash: Hash, data: Vec<u8>) -> Result<(), TrieError> {
        self.store
            .put(&self.key(&hash), &data)
            .map_err(|e| TrieError::Storage(e.to_string()))
    }
}
