use crate::account::Account;
use crate::errors::StateError;
use chain_crypto::{Address, Hash};
use chain_kv::KeyValueStore;
use chain_trie::{KvTrieDb, Trie, TrieDb};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

const STATE_TRIE_PREFIX: &[u8] = b"state/";
const STORAGE_TRIE_PREFIX: &[u8] = b"storage/";

/// The full account-state view over a single KV store: a state trie keyed by
/// address holding each account's RLP record, plus a per-block working set of
/// touched accounts that `hash`/`commit`/`revert` operate over.
///
/// Mirrors the original's `StateStorage`: `get_account` always reloads from
/// the trie, `load_account` memoizes into the touched set, and `commit` is
/// the only path that writes anything to the underlying KV store.
pub struct StateStorage<S: KeyValueStore + ?Sized + 'static> {
    kv: Rc<S>,
    state_trie: Trie,
    accounts: HashMap<Address, Option<Account>>,
    account_checkpoint: Hash,
}

impl<S: KeyValueStore + ?Sized + 'static> StateStorage<S> {
    /// Open the state view as of `state_root` (the empty trie if `None`).
    pub fn load_state(kv: Rc<S>, state_root: Option<Hash>) -> Self {
        let db = state_trie_db(Rc::clone(&kv));
        let state_trie = Trie::new(state_root, db);
        let checkpoint = state_root.unwrap_or(chain_crypto::EMPTY_TRIE_ROOT);
        StateStorage {
            kv,
            state_trie,
            accounts: HashMap::new(),
            account_checkpoint: checkpoint,
        }
    }

    fn storage_db(&self) -> Rc<dyn TrieDb> {
        storage_trie_db(Rc::clone(&self.kv))
    }

    /// Fresh load from the trie, bypassing the touched-account cache. Used
    /// where the caller wants a read untouched by in-progress block writes.
    pub fn get_account(&self, address: Address) -> Result<Option<Account>, StateError> {
        self.load_account_from_trie(address)
    }

    fn load_account_from_trie(&self, address: Address) -> Result<Option<Account>, StateError> {
        let Some(raw) = self.state_trie.get(address.as_bytes())? else {
            return Ok(None);
        };
        let contract_hash_offset = contract_hash_from_record(&raw)?;
        let contract = match contract_hash_offset {
            Some(hash) => self.kv.get(hash.as_slice()).map_err(|e| StateError::Kv(e.to_string()))?,
            None => None,
        };
        let account = Account::from_record(&raw, address, contract, self.storage_db())?;
        Ok(Some(account))
    }

    /// Memoizing load: populates the touched-account map on first access so
    /// later calls in the same block see the same in-memory instance.
    pub fn load_account(&mut self, address: Address) -> Result<Option<&mut Account>, StateError> {
        if !self.accounts.contains_key(&address) {
            let loaded = self.load_account_from_trie(address)?;
            self.accounts.insert(address, loaded);
        }
        Ok(self.accounts.get_mut(&address).unwrap().as_mut())
    }

    /// Unconditionally overwrite any existing entry for `address` with a
    /// freshly created, dirty account — a deployment or externally-owned
    /// account creation both go through here.
    pub fn create_account(
        &mut self,
        creator: Address,
        address: Address,
        contract_bytes: Option<Vec<u8>>,
    ) -> &mut Account {
        let account = Account::new(creator, address, contract_bytes, self.storage_db());
        self.accounts.insert(address, Some(account));
        self.accounts.get_mut(&address).unwrap().as_mut().unwrap()
    }

    /// Root hash as if every dirty account were written, without persisting
    /// anything to the KV store. Re-encodes dirty accounts into the state
    /// trie in memory; storage tries are hashed but not committed.
    pub fn hash(&mut self) -> Result<Hash, StateError> {
        for account in self.accounts.values_mut().flatten() {
            if account.dirty {
                account.hash_storage()?;
                let raw = account.encode_record();
                self.state_trie.update(account.address().as_bytes(), Some(raw))?;
            }
        }
        Ok(self.state_trie.hash()?)
    }

    /// Persist every dirty account: contract bytes and storage trie to the
    /// KV store, the account record into the state trie, then commit the
    /// state trie itself and advance the checkpoint.
    pub fn commit(&mut self) -> Result<Hash, StateError> {
        for account in self.accounts.values_mut().flatten() {
            if account.dirty {
                account.commit_storage(self.kv.as_ref())?;
                let raw = account.encode_record();
                self.state_trie.update(account.address().as_bytes(), Some(raw))?;
                account.clear_dirty();
            }
        }
        let root = self.state_trie.commit()?;
        self.account_checkpoint = root;
        debug!(state_root = %hex::encode(root), "committed state");
        Ok(root)
    }

    /// Discard the working set and reopen the state trie at the last
    /// checkpoint.
    pub fn revert(&mut self) {
        self.accounts.clear();
        let db = state_trie_db(Rc::clone(&self.kv));
        self.state_trie = Trie::new(Some(self.account_checkpoint), db);
    }

    pub fn checkpoint(&self) -> Hash {
        self.account_checkpoint
    }
}

fn state_trie_db<S: KeyValueStore + ?Sized + 'static>(kv: Rc<S>) -> Rc<dyn TrieDb> {
    Rc::new(KvTrieDb::new(kv, STATE_TRIE_PREFIX))
}

fn storage_trie_db<S: KeyValueStore + ?Sized + 'static>(kv: Rc<S>) -> Rc<dyn TrieDb> {
    Rc::new(KvTrieDb::new(kv, STORAGE_TRIE_PREFIX))
}

/// Pull just the `contract_hash` field out of an account's RLP record,
/// without decoding the rest — used to decide whether a contract-bytes
/// lookup is needed before the live storage trie is opened.
fn contract_hash_from_record(raw: &[u8]) -> Result<Option<Hash>, StateError> {
    let rlp = rlp::Rlp::new(raw);
    let bytes: Vec<u8> = rlp.val_at(1)?;
    if bytes.len() != 32 {
        return Err(StateError::Rlp(rlp::DecoderError::Custom(
            "hash must be 32 bytes",
        )));
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(if hash == chain_crypto::EMPTY_HASH {
        None
    } else {
        Some(hash)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_kv::MemoryKv;

    fn kv() -> Rc<MemoryKv> {
        Rc::new(MemoryKv::new())
    }

    fn sample_address() -> Address {
        let kp = chain_crypto::KeyPair::generate();
        Address::from_public_key(&kp.public_key())
    }

    #[test]
    fn unknown_account_is_none() {
        let storage = StateStorage::load_state(kv(), None);
        assert!(storage.get_account(sample_address()).unwrap().is_none());
    }

    #[test]
    fn create_then_commit_then_reload_sees_account() {
        let kv = kv();
        let mut storage = StateStorage::load_state(Rc::clone(&kv), None);
        let addr = sample_address();
        let creator = sample_address();
        storage.create_account(creator, addr, None);
        let root = storage.commit().unwrap();

        let reopened = StateStorage::load_state(kv, Some(root));
        let account = reopened.get_account(addr).unwrap().unwrap();
        assert_eq!(account.creator, creator);
        assert!(!account.is_contract());
    }

    #[test]
    fn hash_does_not_persist_to_kv() {
        let kv = kv();
        let mut storage = StateStorage::load_state(Rc::clone(&kv), None);
        let addr = sample_address();
        storage.create_account(sample_address(), addr, None);
        let speculative_root = storage.hash().unwrap();

        let reopened = StateStorage::load_state(Rc::clone(&kv), Some(speculative_root));
        assert!(reopened.get_account(addr).unwrap().is_none());
    }

    #[test]
    fn revert_drops_uncommitted_changes() {
        let kv = kv();
        let mut storage = StateStorage::load_state(kv, None);
        let checkpoint = storage.checkpoint();
        let addr = sample_address();
        storage.create_account(sample_address(), addr, None);
        storage.revert();
        assert!(storage.get_account(addr).unwrap().is_none());
        assert_eq!(storage.checkpoint(), checkpoint);
    }

    #[test]
    fn load_account_memoizes_across_calls() {
        let kv = kv();
        let mut storage = StateStorage::load_state(kv, None);
        let addr = sample_address();
        storage.create_account(sample_address(), addr, None);
        storage.commit().unwrap();

        storage.load_account(addr).unwrap().unwrap().set_storage(b"k", b"v".to_vec()).unwrap();
        let account = storage.load_account(addr).unwrap().unwrap();
        assert_eq!(account.get_storage(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
