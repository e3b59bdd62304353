use crate::config::NodeConfig;
use crate::errors::ConsensusError;
use crate::token::{EngineToken, NoToken};
use chain_abi::Contract;
use chain_chainstore::{ChainStorage, MetaStorage};
use chain_crypto::{Address, Hash, MethodId, EMPTY_HASH};
use chain_gas::{GasHouse, GasToken};
use chain_kv::KeyValueStore;
use chain_state::StateStorage;
use chain_types::{Receipt, ReceiptCode, Transaction};
use chain_vm::Engine;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

const INIT_FUNCTION_NAME: &str = "init";

/// Drives one block's worth of the validate/apply/commit pipeline against
/// the trie-backed storage crates, the way the original's `App` wraps
/// `StateStorage`/`ChainStorage`/`MetaStorage` and a swappable gas station.
/// Unlike the original, every store shares one `KeyValueStore` under
/// distinct key prefixes rather than three separate RocksDB directories --
/// the storage crates already carry that prefixing, so a single `Rc<S>`
/// is enough.
pub struct App<S: KeyValueStore + ?Sized + 'static> {
    kv: Rc<S>,
    meta: MetaStorage<S>,
    chain: ChainStorage<S>,
    state: Rc<RefCell<StateStorage<S>>>,
    gas_house: GasHouse,
    config: NodeConfig,
}

impl<S: KeyValueStore + ?Sized + 'static> App<S> {
    pub fn new(kv: Rc<S>, config: NodeConfig) -> Self {
        let meta = MetaStorage::new(Rc::clone(&kv));
        let chain = ChainStorage::new(Rc::clone(&kv));
        let state = Rc::new(RefCell::new(StateStorage::load_state(Rc::clone(&kv), None)));
        App {
            kv,
            meta,
            chain,
            state,
            gas_house: GasHouse::new(),
            config,
        }
    }

    /// Open the state at `prev_block_hash`'s root and start assembling the
    /// block that succeeds it, then let the gas station observe whether it
    /// should switch itself out.
    pub fn begin(&mut self, height: u64, prev_block_hash: Hash, time: u64) -> Result<(), ConsensusError> {
        let previous = self.chain.get_block(prev_block_hash)?;
        debug!(height, previous_height = previous.height, "beginning block");
        if height != previous.height + 1 {
            warn!(height, expected = previous.height + 1, "begin height does not follow chain tip");
        }

        let root = if previous.state_root == EMPTY_HASH {
            None
        } else {
            Some(previous.state_root)
        };
        self.state = Rc::new(RefCell::new(StateStorage::load_state(Rc::clone(&self.kv), root)));
        self.chain.compose_block(&previous, time);

        let token = self.gas_contract_token(previous.height + 1, time)?;
        while self
            .gas_house
            .try_switch(token.as_ref().map(|t| t as &dyn GasToken))?
        {}
        Ok(())
    }

    /// `Err(ConsensusError::Reject(reason))` is the only outcome that drops
    /// the transaction; anything else propagating from here is fatal.
    pub fn check(&self, raw_tx: &[u8]) -> Result<(), ConsensusError> {
        let tx = self.decode_tx(raw_tx)?;
        self.validate_tx(&tx)
    }

    /// Re-validates and applies. A rejected transaction is the only case
    /// that returns `Err`; a transaction that validates but fails to apply
    /// still returns `Ok` with its failure recorded in the receipt.
    pub fn deliver(&mut self, raw_tx: &[u8]) -> Result<ReceiptCode, ConsensusError> {
        let tx = self.decode_tx(raw_tx)?;
        self.validate_tx(&tx)?;
        let receipt = self.apply_transaction(&tx)?;
        let code = receipt.code;
        self.chain.add_transaction_with_receipt(tx, receipt)?;
        Ok(code)
    }

    /// Flushes state, seals the block, and records its secondary indexes.
    /// The returned hash is what the sequencer hands back as `app_hash` on
    /// the next `begin`.
    pub fn commit(&mut self) -> Result<Hash, ConsensusError> {
        let state_root = self.state.borrow_mut().commit()?;
        let block_hash = self.chain.commit(state_root)?;
        if let Some(block) = self.chain.current_block() {
            if let Err(e) = self.meta.store_block_metas(block) {
                warn!(error = %e, "failed to store block metas");
            }
            info!(height = block.height, hash = %hex::encode(block_hash), "committed block");
        }
        Ok(block_hash)
    }

    pub fn info(&self) -> Result<(u64, Hash), ConsensusError> {
        let height = self.meta.latest_block_height()?;
        let hash = self
            .meta
            .block_height_to_block_hash(height)?
            .unwrap_or(EMPTY_HASH);
        Ok((height, hash))
    }

    fn decode_tx(&self, raw_tx: &[u8]) -> Result<Transaction, ConsensusError> {
        if raw_tx.len() > self.config.max_tx_size {
            return Err(ConsensusError::reject("transaction exceeds maximum size"));
        }
        Transaction::decode(raw_tx).map_err(|e| ConsensusError::reject(format!("malformed transaction: {e}")))
    }

    fn validate_tx(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.version != 1 {
            return Err(ConsensusError::reject("unsupported transaction version"));
        }

        let sender = Address::from_public_key(&tx.sender.public_key);
        let stored_nonce = {
            let state = self.state.borrow();
            state.get_account(sender)?.map(|a| a.nonce).unwrap_or(0)
        };
        if tx.sender.nonce != stored_nonce {
            warn!(sender = %sender, expected = stored_nonce, got = tx.sender.nonce, "nonce mismatch");
            return Err(ConsensusError::reject(format!(
                "nonce mismatch: tx has {}, account has {stored_nonce}",
                tx.sender.nonce
            )));
        }

        if !tx.verify_signature() {
            return Err(ConsensusError::reject("signature verification failed"));
        }

        if tx.payload.id != MethodId::default() {
            let header = self.resolve_header(tx)?;
            let function = header
                .get_function_by_id(&tx.payload.id)
                .ok_or_else(|| ConsensusError::reject(format!("method {} not found", tx.payload.id)))?;
            chain_abi::decode_to_bytes(&function.parameters, &tx.payload.args)
                .map_err(|e| ConsensusError::reject(format!("bad arguments: {e}")))?;
        }

        let (height, time) = self.current_block_height_time();
        let fee = tx.gas_limit as u64 * tx.gas_price as u64;
        let token = self.gas_contract_token(height, time)?;
        let station = self.gas_house.station();
        let sufficient = match &token {
            Some(t) => station.sufficient(t, sender, fee)?,
            None => station.sufficient(&NoToken, sender, fee)?,
        };
        if !sufficient {
            return Err(ConsensusError::reject("insufficient balance for gas fee"));
        }
        if !station.check_gas_price(tx.gas_price) {
            return Err(ConsensusError::reject("gas price below station minimum"));
        }

        Ok(())
    }

    fn resolve_header(&self, tx: &Transaction) -> Result<chain_abi::Header, ConsensusError> {
        if tx.receiver.is_empty() {
            let contract = Contract::decode(&tx.payload.contract)
                .map_err(|e| ConsensusError::reject(format!("malformed deployment contract: {e}")))?;
            return Ok(contract.header);
        }

        let state = self.state.borrow();
        let account = state
            .get_account(tx.receiver)?
            .ok_or_else(|| ConsensusError::reject("receiver account not found"))?;
        if !account.is_contract() {
            return Err(ConsensusError::reject("receiver is not a contract"));
        }
        let bytes = account
            .contract_bytes()
            .ok_or_else(|| ConsensusError::reject("receiver has no deployed code"))?;
        let contract = Contract::decode(bytes)
            .map_err(|e| ConsensusError::reject(format!("malformed deployed contract: {e}")))?;
        Ok(contract.header)
    }

    fn apply_transaction(&mut self, tx: &Transaction) -> Result<Receipt, ConsensusError> {
        if tx.receiver.is_empty() {
            self.deploy_contract(tx)
        } else {
            self.invoke_contract(tx)
        }
    }

    fn deploy_contract(&mut self, tx: &Transaction) -> Result<Receipt, ConsensusError> {
        let mut receipt = empty_receipt(tx);
        let sender = Address::from_public_key(&tx.sender.public_key);
        let (height, time) = self.current_block_height_time();

        let policy = self.gas_house.station().rc_policy();
        let contract_cost = policy.cost_for_contract(tx.payload.contract.len());
        receipt.gas_used = contract_cost as u32;
        if tx.gas_limit < receipt.gas_used {
            receipt.code = ReceiptCode::OutOfGas;
            return Ok(receipt);
        }

        let contract = Contract::decode(&tx.payload.contract)?;
        let contract_address = Address::deployment_address(&sender, tx.sender.nonce);
        self.state
            .borrow_mut()
            .create_account(sender, contract_address, Some(tx.payload.contract.clone()));

        if tx.payload.id == MethodId::from_name(INIT_FUNCTION_NAME) {
            let function = contract
                .header
                .get_function_by_id(&tx.payload.id)
                .ok_or_else(|| chain_abi::AbiError::FunctionNotFound(tx.payload.id.to_string()))?;
            let function_name = function.name.clone();
            let budget = (tx.gas_limit - receipt.gas_used) as u64;
            let engine = Engine::new(
                Rc::clone(&self.state),
                contract_address,
                sender,
                Rc::clone(&policy),
                budget,
                self.config.max_call_depth,
                height,
                time,
            );
            match engine.ignite(&function_name, &tx.payload.args) {
                Ok(result) => {
                    receipt.gas_used += engine.gas_used() as u32;
                    if self.sufficient_for(sender, receipt.gas_used, tx.gas_price, height, time)? {
                        receipt.result = result;
                        receipt.code = ReceiptCode::Ok;
                        receipt.events = engine.events();
                    } else {
                        receipt.code = ReceiptCode::OutOfGas;
                        receipt.gas_used = tx.gas_limit;
                        self.state.borrow_mut().revert();
                    }
                }
                Err(e) => {
                    warn!(error = %e, "deployment init ignite failed");
                    receipt.gas_used += engine.gas_used() as u32;
                    receipt.code = ReceiptCode::IgniteError;
                    self.state.borrow_mut().revert();
                }
            }
        }

        self.finalize_receipt(sender, tx, height, time, &mut receipt)?;
        Ok(receipt)
    }

    fn invoke_contract(&mut self, tx: &Transaction) -> Result<Receipt, ConsensusError> {
        let mut receipt = empty_receipt(tx);
        let sender = Address::from_public_key(&tx.sender.public_key);

        let contract_bytes = {
            let mut state = self.state.borrow_mut();
            state
                .load_account(tx.receiver)?
                .and_then(|account| account.contract_bytes().map(|b| b.to_vec()))
        };
        let Some(contract_bytes) = contract_bytes else {
            receipt.code = ReceiptCode::ContractNotFound;
            return Ok(receipt);
        };

        let contract = Contract::decode(&contract_bytes)?;
        let Some(function) = contract.header.get_function_by_id(&tx.payload.id) else {
            receipt.code = ReceiptCode::MethodNotFound;
            return Ok(receipt);
        };
        let function_name = function.name.clone();

        let (height, time) = self.current_block_height_time();
        let policy = self.gas_house.station().rc_policy();
        let engine = Engine::new(
            Rc::clone(&self.state),
            tx.receiver,
            sender,
            policy,
            tx.gas_limit as u64,
            self.config.max_call_depth,
            height,
            time,
        );
        match engine.ignite(&function_name, &tx.payload.args) {
            Ok(result) => {
                receipt.gas_used = engine.gas_used() as u32;
                if self.sufficient_for(sender, receipt.gas_used, tx.gas_price, height, time)? {
                    receipt.result = result;
                    receipt.code = ReceiptCode::Ok;
                    receipt.events = engine.events();
                } else {
                    receipt.code = ReceiptCode::OutOfGas;
                    receipt.gas_used = tx.gas_limit;
                    self.state.borrow_mut().revert();
                }
            }
            Err(e) => {
                warn!(error = %e, "invoke ignite failed");
                receipt.gas_used = engine.gas_used() as u32;
                receipt.code = ReceiptCode::IgniteError;
                self.state.borrow_mut().revert();
            }
        }

        self.finalize_receipt(sender, tx, height, time, &mut receipt)?;
        Ok(receipt)
    }

    /// Increments the sender's nonce (creating the account if needed),
    /// unconditionally burns `gas_used * gas_price`, and stamps the
    /// post-state hash. Run after any revert, never before, since revert
    /// reopens state at the last successful checkpoint.
    fn finalize_receipt(
        &mut self,
        sender: Address,
        tx: &Transaction,
        height: u64,
        time: u64,
        receipt: &mut Receipt,
    ) -> Result<(), ConsensusError> {
        self.increase_nonce(sender)?;

        let fee = receipt.gas_used as u64 * tx.gas_price as u64;
        let mut token = self.gas_token(height, time)?;
        let burn_events = self
            .gas_house
            .station()
            .burn(token.as_mut(), sender, fee)?;
        receipt.events.extend(burn_events);
        receipt.post_state = self.state.borrow_mut().hash()?;
        Ok(())
    }

    fn sufficient_for(
        &self,
        sender: Address,
        gas_used: u32,
        gas_price: u32,
        height: u64,
        time: u64,
    ) -> Result<bool, ConsensusError> {
        let fee = gas_used as u64 * gas_price as u64;
        let token = self.gas_token(height, time)?;
        Ok(self.gas_house.station().sufficient(token.as_ref(), sender, fee)?)
    }

    fn increase_nonce(&mut self, address: Address) -> Result<(), ConsensusError> {
        let mut state = self.state.borrow_mut();
        let existing_nonce = state.load_account(address)?.map(|account| account.nonce);
        let nonce = match existing_nonce {
            Some(n) => n,
            None => {
                state.create_account(address, address, None);
                0
            }
        };
        let account = state
            .load_account(address)?
            .expect("account just loaded or created");
        account.set_nonce(nonce + 1);
        Ok(())
    }

    fn current_block_height_time(&self) -> (u64, u64) {
        match self.chain.current_block() {
            Some(block) => (block.height, block.time),
            None => (0, 0),
        }
    }

    /// `None` until a gas contract address has been configured, regardless
    /// of whether a token has actually been deployed there yet.
    fn gas_contract_token(
        &self,
        height: u64,
        time: u64,
    ) -> Result<Option<EngineToken<S>>, ConsensusError> {
        match self.config.gas_contract {
            Some(addr) => Ok(Some(EngineToken::new(Rc::clone(&self.state), addr, height, time)?)),
            None => Ok(None),
        }
    }

    fn gas_token(&self, height: u64, time: u64) -> Result<Box<dyn GasToken>, ConsensusError> {
        match self.gas_contract_token(height, time)? {
            Some(token) => Ok(Box::new(token)),
            None => Ok(Box::new(NoToken)),
        }
    }
}

fn empty_receipt(tx: &Transaction) -> Receipt {
    Receipt {
        transaction: tx.hash(),
        index: 0,
        result: 0,
        gas_used: 0,
        code: ReceiptCode::Ok,
        events: Vec::new(),
        post_state: EMPTY_HASH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_crypto::KeyPair;
    use chain_kv::MemoryKv;
    use chain_types::{TxPayload, TxSender};

    fn new_app() -> App<MemoryKv> {
        let kv = Rc::new(MemoryKv::new());
        let mut app = App::new(kv, NodeConfig::default());
        app.begin(1, EMPTY_HASH, 1_000).unwrap();
        app
    }

    fn signed_tx(keypair: &KeyPair, nonce: u64, receiver: Address, payload: TxPayload) -> Transaction {
        let mut tx = Transaction {
            version: 1,
            sender: TxSender {
                public_key: keypair.public_key(),
                nonce,
            },
            receiver,
            payload,
            gas_price: 1,
            gas_limit: 100_000,
            signature: Vec::new(),
        };
        let sig = keypair.sign(&tx.sig_hash());
        tx.signature = sig.0.to_vec();
        tx
    }

    fn empty_payload() -> TxPayload {
        TxPayload {
            id: MethodId::default(),
            args: Vec::new(),
            contract: Vec::new(),
        }
    }

    fn random_address() -> Address {
        Address::from_public_key(&KeyPair::generate().public_key())
    }

    #[test]
    fn rejects_oversized_transaction() {
        let app = new_app();
        let raw = vec![0u8; app.config.max_tx_size + 1];
        let err = app.check(&raw).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn rejects_malformed_transaction_bytes() {
        let app = new_app();
        let err = app.check(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn rejects_wrong_version() {
        let app = new_app();
        let kp = KeyPair::generate();
        let mut tx = signed_tx(&kp, 0, random_address(), empty_payload());
        tx.version = 2;
        let err = app.check(&tx.encode()).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn rejects_nonce_mismatch() {
        let app = new_app();
        let kp = KeyPair::generate();
        let tx = signed_tx(&kp, 7, random_address(), empty_payload());
        let err = app.check(&tx.encode()).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn rejects_bad_signature() {
        let app = new_app();
        let kp = KeyPair::generate();
        let mut tx = signed_tx(&kp, 0, random_address(), empty_payload());
        tx.signature[0] ^= 0xff;
        let err = app.check(&tx.encode()).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn accepts_well_formed_invoke_with_no_method_call() {
        let app = new_app();
        let kp = KeyPair::generate();
        let tx = signed_tx(&kp, 0, random_address(), empty_payload());
        app.check(&tx.encode()).unwrap();
    }

    #[test]
    fn deploy_with_undecodable_contract_bytes_is_fatal() {
        let mut app = new_app();
        let kp = KeyPair::generate();
        let payload = TxPayload {
            id: MethodId::default(),
            args: Vec::new(),
            contract: vec![1, 2, 3, 4],
        };
        let tx = signed_tx(&kp, 0, chain_crypto::EMPTY_ADDRESS, payload);
        let raw = tx.encode();
        app.check(&raw).unwrap();
        assert!(app.deliver(&raw).is_err());
    }

    #[test]
    fn invoke_against_missing_contract_records_receipt_without_rejecting() {
        let mut app = new_app();
        let kp = KeyPair::generate();
        let tx = signed_tx(&kp, 0, random_address(), empty_payload());
        let raw = tx.encode();
        let code = app.deliver(&raw).unwrap();
        assert_eq!(code, ReceiptCode::ContractNotFound);
    }

    #[test]
    fn delivered_deploy_increments_sender_nonce() {
        let mut app = new_app();
        let kp = KeyPair::generate();
        let sender = Address::from_public_key(&kp.public_key());
        let contract = chain_abi::Contract::new(chain_abi::Header::new(1), Vec::new());
        let payload = TxPayload {
            id: MethodId::default(),
            args: Vec::new(),
            contract: contract.encode(),
        };
        let tx = signed_tx(&kp, 0, chain_crypto::EMPTY_ADDRESS, payload);
        let raw = tx.encode();
        app.check(&raw).unwrap();
        let code = app.deliver(&raw).unwrap();
        assert_eq!(code, ReceiptCode::Ok);

        let account = app.state.borrow().get_account(sender).unwrap().unwrap();
        assert_eq!(account.nonce, 1);

        let replayed = signed_tx(&kp, 0, chain_crypto::EMPTY_ADDRESS, empty_payload());
        let err = app.check(&replayed.encode()).unwrap_err();
        assert!(err.as_reject_log().is_some());
    }

    #[test]
    fn begin_check_deliver_commit_round_trip() {
        let mut app = new_app();
        let kp = KeyPair::generate();
        let tx = signed_tx(&kp, 0, random_address(), empty_payload());
        app.deliver(&tx.encode()).unwrap();

        let block_hash = app.commit().unwrap();
        let (height, hash) = app.info().unwrap();
        assert_eq!(height, 1);
        assert_eq!(hash, block_hash);

        app.begin(2, block_hash, 2_000).unwrap();
        assert_eq!(app.current_block_height_time().0, 2);
    }
}
