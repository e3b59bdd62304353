use crate::errors::StateError;
use chain_crypto::{blake2b_256, Address, Hash, EMPTY_HASH};
use chain_trie::{KvTrieDb, Trie, TrieDb};
use rlp::{DecoderError, Rlp, RlpStream};
use std::rc::Rc;

/// An on-chain account: nonce, creator, deployed contract hash, and the
/// root of its own storage trie. The address is the trie key this record
/// sits under, not one of its own fields.
pub struct Account {
    pub nonce: u64,
    pub contract_hash: Hash,
    pub storage_hash: Hash,
    pub creator: Address,

    pub(crate) dirty: bool,
    address: Address,
    storage: Trie,
    contract: Option<Vec<u8>>,
}

/// The RLP-encoded fields only: `{nonce, contract_hash, storage_hash, creator}`.
/// Runtime-only fields (address, live storage trie, cached contract bytes,
/// dirty flag) never cross the wire, matching the Go struct's lowercase
/// unexported fields.
struct AccountRecord {
    nonce: u64,
    contract_hash: Hash,
    storage_hash: Hash,
    creator: Address,
}

impl rlp::Encodable for AccountRecord {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.nonce);
        s.append(&self.contract_hash.as_slice());
        s.append(&self.storage_hash.as_slice());
        s.append(&self.creator.as_bytes().as_slice());
    }
}

impl rlp::Decodable for AccountRecord {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let contract_hash: Vec<u8> = rlp.val_at(1)?;
        let storage_hash: Vec<u8> = rlp.val_at(2)?;
        let creator_bytes: Vec<u8> = rlp.val_at(3)?;
        Ok(AccountRecord {
            nonce: rlp.val_at(0)?,
            contract_hash: to_hash(contract_hash)?,
            storage_hash: to_hash(storage_hash)?,
            creator: Address::from_bytes(&creator_bytes)
                .map_err(|_| DecoderError::Custom("malformed creator address"))?,
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

impl Account {
    /// Build a fresh, dirty account for `address`, owned by `creator`. If
    /// `contract_bytes` is non-empty this is a contract deployment: its
    /// hash is derived and the bytes are cached for the next commit.
    pub fn new(
        creator: Address,
        address: Address,
        contract_bytes: Option<Vec<u8>>,
        storage_db: Rc<dyn TrieDb>,
    ) -> Self {
        let mut account = Account {
            nonce: 0,
            contract_hash: EMPTY_HASH,
            storage_hash: chain_crypto::EMPTY_TRIE_ROOT,
            creator,
            dirty: true,
            address,
            storage: Trie::new(None, storage_db),
            contract: None,
        };
        if let Some(bytes) = contract_bytes {
            account.set_contract(bytes);
        }
        account
    }

    /// Reconstruct an account from its trie-stored record plus the contract
    /// bytes fetched from the global KV (if any) and a handle onto its
    /// storage trie.
    pub(crate) fn from_record(
        raw: &[u8],
        address: Address,
        contract: Option<Vec<u8>>,
        storage_db: Rc<dyn TrieDb>,
    ) -> Result<Self, StateError> {
        let record: AccountRecord = rlp::decode(raw)?;
        Ok(Account {
            nonce: record.nonce,
            contract_hash: record.contract_hash,
            storage_hash: record.storage_hash,
            creator: record.creator,
            dirty: false,
            address,
            storage: Trie::new(Some(record.storage_hash), storage_db),
            contract,
        })
    }

    pub(crate) fn encode_record(&self) -> Vec<u8> {
        let record = AccountRecord {
            nonce: self.nonce,
            contract_hash: self.contract_hash,
            storage_hash: self.storage_hash,
            creator: self.creator,
        };
        rlp::encode(&record).to_vec()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_contract(&self) -> bool {
        self.contract_hash != EMPTY_HASH
    }

    pub fn contract_bytes(&self) -> Option<&[u8]> {
        self.contract.as_deref()
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.dirty = true;
        self.nonce = nonce;
    }

    fn set_contract(&mut self, bytes: Vec<u8>) {
        self.dirty = true;
        if !bytes.is_empty() {
            self.contract_hash = blake2b_256(&bytes);
        }
        self.contract = Some(bytes);
    }

    pub fn get_storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.storage.get(key)?)
    }

    pub fn set_storage(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        self.dirty = true;
        self.storage.update(key, Some(value))?;
        Ok(())
    }

    /// Refresh `storage_hash` from the live storage trie without persisting
    /// it. Used to fill a receipt's `post_state` mid-block.
    pub(crate) fn hash_storage(&mut self) -> Result<(), StateError> {
        self.storage_hash = self.storage.hash()?;
        Ok(())
    }

    /// Persist contract bytes (if any) and the storage trie, updating
    /// `storage_hash` to the freshly committed root.
    pub(crate) fn commit_storage(&mut self, kv: &dyn chain_kv::KeyValueStore) -> Result<(), StateError> {
        if self.is_contract() {
            if let Some(bytes) = &self.contract {
                kv.put(self.contract_hash.as_slice(), bytes)
                    .map_err(|e| StateError::Kv(e.to_string()))?;
            }
        }
        self.storage_hash = self.storage.commit()?;
        Ok(())
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
