use thiserror::Error;

/// Errors surfaced by the consensus adapter. `Reject` is the one CHECK
/// outcome that drops a transaction before it ever reaches a receipt; every
/// other variant is fatal (storage/codec corruption, a contract invariant
/// the adapter itself relies on) and should bubble up as `anyhow::Error` to
/// whatever drives `deliver`/`commit`, not be treated as a rejection.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("{0}")]
    Reject(String),

    #[error(transparent)]
    State(#[from] chain_state::StateError),

    #[error(transparent)]
    ChainStore(#[from] chain_chainstore::ChainStoreError),

    #[error(transparent)]
    Vm(#[from] chain_vm::VmError),

    #[error(transparent)]
    Abi(#[from] chain_abi::AbiError),

    #[error(transparent)]
    Crypto(#[from] chain_crypto::CryptoError),

    #[error(transparent)]
    Gas(#[from] chain_gas::GasError),
}

impl ConsensusError {
    pub fn reject(reason: impl Into<String>) -> Self {
        ConsensusError::Reject(reason.into())
    }

    /// The ABCI `log` string for a CHECK rejection; `None` for anything
    /// that isn't a rejection (those propagate as fatal errors instead).
    pub fn as_reject_log(&self) -> Option<&str> {
        match self {
            ConsensusError::Reject(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}
