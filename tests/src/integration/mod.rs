mod chain_lifecycle;
mod state_persistence;
