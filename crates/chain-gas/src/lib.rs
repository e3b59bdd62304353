//! Gas metering: the per-opcode cost table, the storage/contract/event
//! byte-cost policies, and the fee station that decides whether a
//! transaction pays anything at all.
pub mod alpha_policy;
pub mod errors;
pub mod free_policy;
pub mod opcode;
pub mod policy;
pub mod station;
pub mod token;

pub use alpha_policy::AlphaPolicy;
pub use errors::GasError;
pub use free_policy::FreePolicy;
pub use opcode::{cost_for_op, WasmOp};
pub use policy::GasPolicy;
pub use station::{FreeStation, GasHouse, GasStation, LiquidStation};
pub use token::GasToken;
