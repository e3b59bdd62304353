use chain_abi::{ArgValue, Parameter, PrimitiveType};
use chain_crypto::Address;
use chain_gas::{GasError, GasToken};
use chain_kv::KeyValueStore;
use chain_state::StateStorage;
use chain_types::Event;
use chain_vm::{Engine, MAX_CALL_DEPTH};
use std::cell::RefCell;
use std::rc::Rc;

const METHOD_GET_BALANCE: &str = "get_balance";
const METHOD_TRANSFER: &str = "transfer";

/// Bridges a station's fee bookkeeping to the deployed gas-token contract's
/// own WASM methods. `get_balance`/`transfer` are not storage reads this
/// crate performs directly -- they are unmetered invocations of the
/// contract itself, matching the original's `Token` wrapper around `Engine`
/// with a free policy and a zero gas budget, since these are internal
/// accounting calls rather than user transactions.
pub struct EngineToken<S: KeyValueStore + ?Sized + 'static> {
    state: Rc<RefCell<StateStorage<S>>>,
    contract: Address,
    creator: Address,
    block_height: u64,
    block_time: u64,
}

impl<S: KeyValueStore + ?Sized + 'static> EngineToken<S> {
    pub fn new(
        state: Rc<RefCell<StateStorage<S>>>,
        contract: Address,
        block_height: u64,
        block_time: u64,
    ) -> Result<Self, GasError> {
        let creator = {
            let mut storage = state.borrow_mut();
            let account = storage
                .load_account(contract)
                .map_err(|e| GasError::BalanceLookup(e.to_string()))?
                .ok_or_else(|| GasError::BalanceLookup("gas contract account not found".to_string()))?;
            account.creator
        };
        Ok(EngineToken {
            state,
            contract,
            creator,
            block_height,
            block_time,
        })
    }

    fn engine(&self, caller: Address) -> Engine<S> {
        Engine::new(
            Rc::clone(&self.state),
            self.contract,
            caller,
            Rc::new(chain_gas::FreePolicy),
            0,
            MAX_CALL_DEPTH,
            self.block_height,
            self.block_time,
        )
    }
}

impl<S: KeyValueStore + ?Sized + 'static> GasToken for EngineToken<S> {
    fn balance(&self, addr: Address) -> Result<u64, GasError> {
        let params = [Parameter::new("addr", PrimitiveType::Address)];
        let args = chain_abi::encode(&params, &[ArgValue::Address(addr)])
            .map_err(|e| GasError::BalanceLookup(e.to_string()))?;
        self.engine(addr)
            .ignite(METHOD_GET_BALANCE, &args)
            .map_err(|e| GasError::BalanceLookup(e.to_string()))
    }

    fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: u64,
        memo: u64,
    ) -> Result<Vec<Event>, GasError> {
        let params = [
            Parameter::new("to", PrimitiveType::Address),
            Parameter::new("amount", PrimitiveType::Uint64),
            Parameter::new("memo", PrimitiveType::Uint64),
        ];
        let values = [ArgValue::Address(to), ArgValue::U64(amount), ArgValue::U64(memo)];
        let args = chain_abi::encode(&params, &values).map_err(|e| GasError::Transfer(e.to_string()))?;
        let engine = self.engine(caller);
        engine
            .ignite(METHOD_TRANSFER, &args)
            .map_err(|e| GasError::Transfer(e.to_string()))?;
        Ok(engine.events())
    }

    fn creator(&self) -> Address {
        self.creator
    }

    fn address(&self) -> Address {
        self.contract
    }
}

/// Stand-in `GasToken` for when no gas contract has been configured yet.
/// `FreeStation` never dereferences the token it's handed, so these methods
/// are never actually called in that state; they exist so `check`/`deliver`
/// always have a `&dyn GasToken` to pass regardless of station.
pub(crate) struct NoToken;

impl GasToken for NoToken {
    fn balance(&self, _addr: Address) -> Result<u64, GasError> {
        Ok(0)
    }

    fn transfer(
        &mut self,
        _caller: Address,
        _to: Address,
        _amount: u64,
        _memo: u64,
    ) -> Result<Vec<Event>, GasError> {
        Ok(Vec::new())
    }

    fn creator(&self) -> Address {
        chain_crypto::EMPTY_ADDRESS
    }

    fn address(&self) -> Address {
        chain_crypto::EMPTY_ADDRESS
    }
}
