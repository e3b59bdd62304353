use crate::errors::ChainStoreError;
use chain_crypto::{Hash, EMPTY_HASH};
use chain_kv::KeyValueStore;
use chain_trie::{KvTrieDb, Trie, TrieDb};
use chain_types::{genesis_block, Block, Receipt, Transaction};
use std::rc::Rc;
use tracing::debug;

const BLOCK_PREFIX: &[u8] = b"block/";
const TX_TRIE_PREFIX: &[u8] = b"blocktx/";
const RECEIPT_TRIE_PREFIX: &[u8] = b"blockreceipt/";

/// Assembles the block currently in progress: the header plus the two tries
/// (transactions, receipts) it is built from, and the flat KV namespace
/// every finished block is stored under by hash.
///
/// Mirrors the original's `ChainStorage`: `compose_block` opens fresh empty
/// tries for a new height, `add_transaction_with_receipt` folds one
/// transaction in at a time, and `commit` is the only place that writes the
/// header (and forces both tries' roots) to the KV store.
pub struct ChainStorage<S: KeyValueStore + ?Sized + 'static> {
    kv: Rc<S>,
    tx_trie: Trie,
    receipt_trie: Trie,
    current_block: Option<Block>,
}

impl<S: KeyValueStore + ?Sized + 'static> ChainStorage<S> {
    pub fn new(kv: Rc<S>) -> Self {
        let tx_trie = Trie::new(None, tx_trie_db(Rc::clone(&kv)));
        let receipt_trie = Trie::new(None, receipt_trie_db(Rc::clone(&kv)));
        ChainStorage {
            kv,
            tx_trie,
            receipt_trie,
            current_block: None,
        }
    }

    /// Start assembling the block that succeeds `parent`, proposed at `time`
    /// (consensus-supplied, a Unix timestamp in seconds).
    pub fn compose_block(&mut self, parent: &Block, time: u64) {
        self.current_block = Some(Block::new_empty(parent.hash(), parent.height + 1, time));
        self.tx_trie = Trie::new(None, tx_trie_db(Rc::clone(&self.kv)));
        self.receipt_trie = Trie::new(None, receipt_trie_db(Rc::clone(&self.kv)));
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.current_block.as_ref()
    }

    /// Fold `tx` and its outcome `receipt` into the block in progress. Sets
    /// `receipt.index` to its position within the block before keying it
    /// into the receipt trie, matching the order the original assigns it.
    pub fn add_transaction_with_receipt(
        &mut self,
        tx: Transaction,
        mut receipt: Receipt,
    ) -> Result<(), ChainStoreError> {
        let block = self
            .current_block
            .as_mut()
            .ok_or(ChainStoreError::NoCurrentBlock)?;

        self.tx_trie.update(tx.hash().as_slice(), Some(tx.encode()))?;

        receipt.index = block.receipts().len() as u32;
        self.receipt_trie
            .update(receipt.hash().as_slice(), Some(receipt.encode()))?;

        block.add_transaction(tx);
        block.add_receipt(receipt);
        Ok(())
    }

    /// Finalize the block in progress: set its state root, commit both
    /// tries for their header roots, persist the header, and return its
    /// hash.
    pub fn commit(&mut self, state_root: Hash) -> Result<Hash, ChainStoreError> {
        let block = self
            .current_block
            .as_mut()
            .ok_or(ChainStoreError::NoCurrentBlock)?;

        block.set_state_root(state_root);
        block.set_transaction_root(self.tx_trie.commit()?);
        block.set_receipt_root(self.receipt_trie.commit()?);

        let hash = block.hash();
        let raw = block.encode();
        self.kv
            .put(&block_key(&hash), &raw)
            .map_err(|e| ChainStoreError::Kv(e.to_string()))?;

        debug!(height = block.height, hash = %hex::encode(hash), "committed block");
        Ok(hash)
    }

    /// The genesis block for the empty hash, otherwise whatever was stored
    /// under `hash` by a previous `commit`.
    pub fn get_block(&self, hash: Hash) -> Result<Block, ChainStoreError> {
        if hash == EMPTY_HASH {
            return Ok(genesis_block());
        }
        let raw = self
            .kv
            .get(&block_key(&hash))
            .map_err(|e| ChainStoreError::Kv(e.to_string()))?
            .ok_or(ChainStoreError::TransactionNotFound)?;
        Ok(Block::decode(&raw)?)
    }

    pub fn get_block_transactions(&self, block: &Block) -> Result<Vec<Transaction>, ChainStoreError> {
        let trie = Trie::new(Some(block.transaction_root), tx_trie_db(Rc::clone(&self.kv)));
        trie.entries()?
            .into_iter()
            .map(|(_, raw)| Ok(Transaction::decode(&raw)?))
            .collect()
    }

    pub fn get_block_receipts(&self, block: &Block) -> Result<Vec<Receipt>, ChainStoreError> {
        let trie = Trie::new(Some(block.receipt_root), receipt_trie_db(Rc::clone(&self.kv)));
        trie.entries()?
            .into_iter()
            .map(|(_, raw)| Ok(Receipt::decode(&raw)?))
            .collect()
    }
}

fn block_key(hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(BLOCK_PREFIX.len() + 32);
    key.extend_from_slice(BLOCK_PREFIX);
    key.extend_from_slice(hash);
    key
}

fn tx_trie_db<S: KeyValueStore + ?Sized + 'static>(kv: Rc<S>) -> Rc<dyn TrieDb> {
    Rc::new(KvTrieDb::new(kv, TX_TRIE_PREFIX))
}

fn receipt_trie_db<S: KeyValueStore + ?Sized + 'static>(kv: Rc<S>) -> Rc<dyn TrieDb> {
    Rc::new(KvTrieDb::new(kv, RECEIPT_TRIE_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_kv::MemoryKv;
    use chain_types::{Event, ReceiptCode, TxPayload, TxSender};

    fn kv() -> Rc<MemoryKv> {
        Rc::new(MemoryKv::new())
    }

    fn sample_tx(nonce: u64) -> Transaction {
        let kp = chain_crypto::KeyPair::generate();
        let receiver = chain_crypto::Address::from_public_key(&chain_crypto::KeyPair::generate().public_key());
        let mut tx = Transaction {
            version: 1,
            sender: TxSender {
                public_key: kp.public_key(),
                nonce,
            },
            receiver,
            payload: TxPayload {
                id: chain_crypto::MethodId::from_name("transfer"),
                args: vec![1, 2, 3],
                contract: vec![],
            },
            gas_price: 1,
            gas_limit: 100_000,
            signature: vec![],
        };
        let sig = kp.sign(&tx.sig_hash());
        tx.signature = sig.0.to_vec();
        tx
    }

    fn sample_receipt(tx: &Transaction) -> Receipt {
        Receipt {
            transaction: tx.hash(),
            index: 0,
            result: 1,
            gas_used: 21,
            code: ReceiptCode::Ok,
            events: vec![Event {
                id: chain_crypto::MethodId::from_name("Transfer"),
                args: vec![9],
                contract: chain_crypto::EMPTY_ADDRESS,
            }],
            post_state: [0u8; 32],
        }
    }

    #[test]
    fn get_block_for_empty_hash_is_genesis() {
        let store = ChainStorage::new(kv());
        let genesis = store.get_block(EMPTY_HASH).unwrap();
        assert_eq!(genesis.height, 0);
    }

    #[test]
    fn compose_add_commit_then_reload_round_trips() {
        let mut store = ChainStorage::new(kv());
        let genesis = genesis_block();
        store.compose_block(&genesis, 1_000);

        let tx = sample_tx(0);
        let receipt = sample_receipt(&tx);
        store.add_transaction_with_receipt(tx.clone(), receipt).unwrap();

        let hash = store.commit([7u8; 32]).unwrap();
        let reloaded = store.get_block(hash).unwrap();
        assert_eq!(reloaded.height, 1);
        assert_eq!(reloaded.state_root, [7u8; 32]);

        let txs = store.get_block_transactions(&reloaded).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash(), tx.hash());

        let receipts = store.get_block_receipts(&reloaded).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].index, 0);
    }

    #[test]
    fn second_tx_gets_incrementing_index() {
        let mut store = ChainStorage::new(kv());
        let genesis = genesis_block();
        store.compose_block(&genesis, 1_000);

        let tx1 = sample_tx(0);
        let r1 = sample_receipt(&tx1);
        store.add_transaction_with_receipt(tx1, r1).unwrap();

        let tx2 = sample_tx(1);
        let r2 = sample_receipt(&tx2);
        store.add_transaction_with_receipt(tx2, r2).unwrap();

        let block = store.current_block().unwrap();
        assert_eq!(block.receipts()[0].index, 0);
        assert_eq!(block.receipts()[1].index, 1);
    }

    #[test]
    fn operating_without_compose_is_an_error() {
        let mut store = ChainStorage::new(kv());
        let tx = sample_tx(0);
        let receipt = sample_receipt(&tx);
        assert!(matches!(
            store.add_transaction_with_receipt(tx, receipt),
            Err(ChainStoreError::NoCurrentBlock)
        ));
    }
}
