use crate::alpha_policy::AlphaPolicy;
use crate::errors::GasError;
use crate::free_policy::FreePolicy;
use crate::policy::GasPolicy;
use crate::token::GasToken;
use chain_crypto::Address;
use chain_types::Event;
use std::rc::Rc;

const MINIMUM_GAS_PRICE: u32 = 18;
const FEE_TRANSFER_MEMO: u64 = 0;

/// A fee policy over the gas token: whether an address can afford `fee`,
/// burning it, validating the price a transaction proposes, and — once per
/// chain lifetime — proposing to hand off to a different station.
pub trait GasStation {
    fn sufficient(&self, token: &dyn GasToken, addr: Address, fee: u64) -> Result<bool, GasError>;
    fn burn(
        &self,
        token: &mut dyn GasToken,
        addr: Address,
        fee: u64,
    ) -> Result<Vec<Event>, GasError>;
    fn check_gas_price(&self, price: u32) -> bool;
    fn policy(&self) -> &dyn GasPolicy;

    /// Owned handle onto the same policy `policy()` borrows, for callers
    /// (the execution engine) that need to hold it past the station's own
    /// borrow, e.g. across a cross-contract call chain.
    fn rc_policy(&self) -> Rc<dyn GasPolicy>;

    /// Whether this station should be replaced, and with what. Only
    /// [`FreeStation`] ever proposes a switch; once liquid, a station never
    /// proposes switching away from itself.
    fn propose_switch(
        &self,
        _token: Option<&dyn GasToken>,
    ) -> Result<Option<Box<dyn GasStation>>, GasError> {
        Ok(None)
    }
}

/// No fee is charged and every price is accepted as long as it's nonzero.
/// The initial station for a chain that hasn't minted its gas token yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeStation;

impl FreeStation {
    pub fn new() -> Self {
        FreeStation
    }
}

impl GasStation for FreeStation {
    fn sufficient(&self, _token: &dyn GasToken, _addr: Address, _fee: u64) -> Result<bool, GasError> {
        Ok(true)
    }

    fn burn(&self, _token: &mut dyn GasToken, _addr: Address, _fee: u64) -> Result<Vec<Event>, GasError> {
        Ok(Vec::new())
    }

    fn check_gas_price(&self, price: u32) -> bool {
        price > 0
    }

    fn policy(&self) -> &dyn GasPolicy {
        &FreePolicy
    }

    fn rc_policy(&self) -> Rc<dyn GasPolicy> {
        Rc::new(FreePolicy)
    }

    fn propose_switch(
        &self,
        token: Option<&dyn GasToken>,
    ) -> Result<Option<Box<dyn GasStation>>, GasError> {
        let Some(token) = token else {
            return Ok(None);
        };
        let balance = token.balance(token.creator())?;
        if balance > 0 {
            Ok(Some(Box::new(LiquidStation::new(token.address()))))
        } else {
            Ok(None)
        }
    }
}

/// The gas token is minted: transactions pay a real fee, metered by
/// [`AlphaPolicy`], collected into the token contract's own address.
#[derive(Debug, Clone, Copy)]
pub struct LiquidStation {
    collector: Address,
    policy: AlphaPolicy,
}

impl LiquidStation {
    pub fn new(collector: Address) -> Self {
        LiquidStation {
            collector,
            policy: AlphaPolicy,
        }
    }
}

impl GasStation for LiquidStation {
    fn sufficient(&self, token: &dyn GasToken, addr: Address, fee: u64) -> Result<bool, GasError> {
        Ok(fee <= token.balance(addr)?)
    }

    fn burn(&self, token: &mut dyn GasToken, addr: Address, fee: u64) -> Result<Vec<Event>, GasError> {
        if fee == 0 {
            return Ok(Vec::new());
        }
        token.transfer(addr, self.collector, fee, FEE_TRANSFER_MEMO)
    }

    fn check_gas_price(&self, price: u32) -> bool {
        price >= MINIMUM_GAS_PRICE
    }

    fn policy(&self) -> &dyn GasPolicy {
        &self.policy
    }

    fn rc_policy(&self) -> Rc<dyn GasPolicy> {
        Rc::new(self.policy)
    }
}

/// Owns whichever station is currently active and drives the one-time
/// switch from free to liquid.
pub struct GasHouse {
    station: Box<dyn GasStation>,
}

impl Default for GasHouse {
    fn default() -> Self {
        Self::new()
    }
}

impl GasHouse {
    pub fn new() -> Self {
        GasHouse {
            station: Box::new(FreeStation::new()),
        }
    }

    pub fn station(&self) -> &dyn GasStation {
        self.station.as_ref()
    }

    /// Ask the current station if it wants to be replaced; if so, replace
    /// it and return true. Callers loop `while gas_house.try_switch(token)?
    /// {}` — harmless since a replaced station never proposes a further
    /// switch.
    pub fn try_switch(&mut self, token: Option<&dyn GasToken>) -> Result<bool, GasError> {
        match self.station.propose_switch(token)? {
            Some(new_station) => {
                self.station = new_station;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
