use crate::errors::GasError;
use chain_crypto::Address;
use chain_types::Event;

/// The fee-token contract a gas station burns against. Collapses the
/// original's `Token`/`App.GetGasContractToken` pair down to just the
/// operations a station needs — balance lookup, transfer, and the token
/// contract's own creator/address — rather than exposing the whole account
/// record, so this crate doesn't need to depend on `chain-state`.
pub trait GasToken {
    fn balance(&self, addr: Address) -> Result<u64, GasError>;
    fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: u64,
        memo: u64,
    ) -> Result<Vec<Event>, GasError>;
    fn creator(&self) -> Address;
    fn address(&self) -> Address;
}
