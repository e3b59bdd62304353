//! Validate/apply/commit pipeline for a single replica of the execution
//! core, adapted to the shape an external BFT consensus engine drives it
//! in: `begin` a height, `check`/`deliver` transactions against it, then
//! `commit` and report `info` for the next round.

mod app;
mod config;
mod errors;
mod token;

pub use app::App;
pub use config::NodeConfig;
pub use errors::ConsensusError;
