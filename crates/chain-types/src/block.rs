use crate::{Receipt, Transaction};
use chain_crypto::{blake2b_256, Hash, EMPTY_HASH};
use rlp::{DecoderError, Rlp, RlpStream};
use std::cell::Cell;

/// Block header fields that are part of the canonical, RLP-encoded form.
/// Transactions and receipts are carried alongside a block but committed
/// separately into their own tries; only the resulting roots are part of
/// the header.
#[derive(Debug, Clone)]
pub struct Block {
    pub height: u64,
    pub time: u64,
    pub parent: Hash,
    pub state_root: Hash,
    pub transaction_root: Hash,
    pub receipt_root: Hash,

    transactions: Vec<Transaction>,
    receipts: Vec<Receipt>,
    cached_hash: Cell<Option<Hash>>,
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height
            && self.time == other.time
            && self.parent == other.parent
            && self.state_root == other.state_root
            && self.transaction_root == other.transaction_root
            && self.receipt_root == other.receipt_root
    }
}
impl Eq for Block {}

impl rlp::Encodable for Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(6);
        s.append(&self.height);
        s.append(&self.time);
        s.append(&self.parent.as_slice());
        s.append(&self.state_root.as_slice());
        s.append(&self.transaction_root.as_slice());
        s.append(&self.receipt_root.as_slice());
    }
}

impl rlp::Decodable for Block {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Block {
            height: rlp.val_at(0)?,
            time: rlp.val_at(1)?,
            parent: to_hash(rlp.val_at(2)?)?,
            state_root: to_hash(rlp.val_at(3)?)?,
            transaction_root: to_hash(rlp.val_at(4)?)?,
            receipt_root: to_hash(rlp.val_at(5)?)?,
            transactions: Vec::new(),
            receipts: Vec::new(),
            cached_hash: Cell::new(None),
        })
    }
}

fn to_hash(bytes: Vec<u8>) -> Result<Hash, DecoderError> {
    if bytes.len() != 32 {
        return Err(DecoderError::Custom("hash must be 32 bytes"));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// The first block of the chain: every root is empty, height and time are zero.
pub fn genesis_block() -> Block {
    Block::new_empty(EMPTY_HASH, 0, 0)
}

impl Block {
    pub fn new_empty(parent: Hash, height: u64, time: u64) -> Self {
        Block {
            height,
            time,
            parent,
            state_root: EMPTY_HASH,
            transaction_root: EMPTY_HASH,
            receipt_root: EMPTY_HASH,
            transactions: Vec::new(),
            receipts: Vec::new(),
            cached_hash: Cell::new(None),
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn add_receipt(&mut self, receipt: Receipt) {
        self.receipts.push(receipt);
    }

    pub fn set_state_root(&mut self, root: Hash) {
        self.state_root = root;
        self.cached_hash.set(None);
    }

    pub fn set_transaction_root(&mut self, root: Hash) {
        self.transaction_root = root;
        self.cached_hash.set(None);
    }

    pub fn set_receipt_root(&mut self, root: Hash) {
        self.receipt_root = root;
        self.cached_hash.set(None);
    }

    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecoderError> {
        rlp::decode(raw)
    }

    /// Blake2b-256 of the header's RLP encoding. Memoized like the original:
    /// once computed it never changes unless a setter clears the cache.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.cached_hash.get() {
            return hash;
        }
        let hash = blake2b_256(&self.encode());
        self.cached_hash.set(Some(hash));
        hash
    }
}
