//! WASM contract execution: the host import surface bridging a contract's
//! own `wasmi` instance to chain storage, and the engine that drives one
//! invocation (deploy or invoke) from argument decoding through to gas
//! reconciliation and event collection.
mod engine;
mod errors;
mod gas_meter;
mod wasi;

pub use engine::Engine;
pub use errors::VmError;
pub use gas_meter::GasMeter;

/// Default ceiling on cross-contract call nesting.
pub const MAX_CALL_DEPTH: usize = 1024;
/// Decoded-argument byte budget for a single `Ignite` call.
pub const MAX_ARGUMENT_BYTES: usize = 1024;
