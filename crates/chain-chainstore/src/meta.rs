use crate::errors::ChainStoreError;
use chain_crypto::Hash;
use chain_kv::KeyValueStore;
use chain_types::Block;
use std::rc::Rc;

const BLOCK_HEIGHT_TO_HASH: u8 = 0x0;
const TX_HASH_TO_BLOCK_HEIGHT: u8 = 0x1;
const LATEST_BLOCK_HEIGHT: u8 = 0x2;
const TX_HASH_TO_RECEIPT_HASH: u8 = 0x3;

/// Secondary indexes over committed blocks: height-to-hash, transaction
/// lookups, and the chain's current tip height. Every key is a one-byte
/// prefix plus whatever identifies the record, so all four indexes share a
/// single flat KV namespace without colliding.
pub struct MetaStorage<S: KeyValueStore + ?Sized + 'static> {
    kv: Rc<S>,
}

impl<S: KeyValueStore + ?Sized + 'static> MetaStorage<S> {
    pub fn new(kv: Rc<S>) -> Self {
        MetaStorage { kv }
    }

    /// Extract and persist every index entry a freshly committed block
    /// contributes: its own height/hash pair, one row per transaction and
    /// receipt, and — if this is the new tip — the latest-height marker.
    pub fn store_block_metas(&self, block: &Block) -> Result<(), ChainStoreError> {
        self.put(
            encode_key(BLOCK_HEIGHT_TO_HASH, &block.height.to_le_bytes()),
            block.hash().to_vec(),
        )?;

        let height_bytes = block.height.to_le_bytes().to_vec();
        for tx in block.transactions() {
            self.put(
                encode_key(TX_HASH_TO_BLOCK_HEIGHT, tx.hash().as_slice()),
                height_bytes.clone(),
            )?;
        }
        for receipt in block.receipts() {
            self.put(
                encode_key(TX_HASH_TO_RECEIPT_HASH, receipt.transaction.as_slice()),
                receipt.hash().to_vec(),
            )?;
        }

        if block.height > self.latest_block_height()? {
            self.put(encode_key(LATEST_BLOCK_HEIGHT, &[]), height_bytes)?;
        }
        Ok(())
    }

    pub fn latest_block_height(&self) -> Result<u64, ChainStoreError> {
        match self.get(encode_key(LATEST_BLOCK_HEIGHT, &[]))? {
            Some(bytes) => Ok(decode_u64(&bytes)),
            None => Ok(0),
        }
    }

    pub fn block_height_to_block_hash(&self, height: u64) -> Result<Option<Hash>, ChainStoreError> {
        let raw = self.get(encode_key(BLOCK_HEIGHT_TO_HASH, &height.to_le_bytes()))?;
        Ok(raw.map(|bytes| decode_hash(&bytes)))
    }

    pub fn tx_hash_to_block_height(&self, tx_hash: Hash) -> Result<u64, ChainStoreError> {
        let raw = self.get(encode_key(TX_HASH_TO_BLOCK_HEIGHT, &tx_hash))?;
        raw.map(|bytes| decode_u64(&bytes))
            .ok_or(ChainStoreError::TransactionNotFound)
    }

    pub fn tx_hash_to_receipt_hash(&self, tx_hash: Hash) -> Result<Option<Hash>, ChainStoreError> {
        let raw = self.get(encode_key(TX_HASH_TO_RECEIPT_HASH, &tx_hash))?;
        Ok(raw.map(|bytes| decode_hash(&bytes)))
    }

    fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, ChainStoreError> {
        self.kv.get(&key).map_err(|e| ChainStoreError::Kv(e.to_string()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), ChainStoreError> {
        self.kv
            .put(&key, &value)
            .map_err(|e| ChainStoreError::Kv(e.to_string()))
    }
}

fn encode_key(prefix: u8, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + rest.len());
    key.push(prefix);
    key.extend_from_slice(rest);
    key
}

fn decode_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn decode_hash(bytes: &[u8]) -> Hash {
    let mut hash = [0u8; 32];
    let n = bytes.len().min(32);
    hash[..n].copy_from_slice(&bytes[..n]);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_kv::MemoryKv;
    use chain_types::genesis_block;

    fn kv() -> Rc<MemoryKv> {
        Rc::new(MemoryKv::new())
    }

    #[test]
    fn latest_height_defaults_to_zero() {
        let meta = MetaStorage::new(kv());
        assert_eq!(meta.latest_block_height().unwrap(), 0);
    }

    #[test]
    fn storing_a_block_populates_height_and_hash_indexes() {
        let meta = MetaStorage::new(kv());
        let mut block = genesis_block();
        block.set_state_root([1u8; 32]);
        let hash = block.hash();

        meta.store_block_metas(&block).unwrap();

        assert_eq!(
            meta.block_height_to_block_hash(block.height).unwrap(),
            Some(hash)
        );
        assert_eq!(meta.latest_block_height().unwrap(), block.height);
    }

    #[test]
    fn only_higher_blocks_advance_the_tip() {
        let meta = MetaStorage::new(kv());
        let mut high = chain_types::Block::new_empty([0u8; 32], 5, 1);
        high.set_state_root([2u8; 32]);
        meta.store_block_metas(&high).unwrap();
        assert_eq!(meta.latest_block_height().unwrap(), 5);

        let mut low = chain_types::Block::new_empty([0u8; 32], 2, 1);
        low.set_state_root([3u8; 32]);
        meta.store_block_metas(&low).unwrap();
        assert_eq!(meta.latest_block_height().unwrap(), 5);
    }

    #[test]
    fn unknown_tx_hash_to_block_height_is_not_found() {
        let meta = MetaStorage::new(kv());
        assert!(matches!(
            meta.tx_hash_to_block_height([9u8; 32]),
            Err(ChainStoreError::TransactionNotFound)
        ));
    }
}
