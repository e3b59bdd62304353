use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("out of gas")]
    OutOfGas,
    #[error("ignite error: {0}")]
    Ignite(String),
    #[error("call depth limit reached")]
    CallDepthExceeded,
    #[error("argument byte size exceeds limit")]
    ArgumentsTooLarge,
    #[error("cannot find invoke function {0}")]
    MethodNotFound(String),
    #[error("pointer size not found for {0}")]
    PointerSizeNotFound(i32),
    #[error("wasm module error: {0}")]
    Module(String),
    #[error("wasm trap: {0}")]
    Trap(String),
    #[error(transparent)]
    Abi(#[from] chain_abi::AbiError),
    #[error(transparent)]
    State(#[from] chain_state::StateError),
    #[error(transparent)]
    Gas(#[from] chain_gas::GasError),
    #[error(transparent)]
    Crypto(#[from] chain_crypto::CryptoError),
}

impl From<VmError> for wasmi::Error {
    fn from(err: VmError) -> Self {
        wasmi::Error::new(err.to_string())
    }
}
