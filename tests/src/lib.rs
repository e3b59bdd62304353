//! Cross-crate integration tests for the execution core.
//!
//! Unit tests live alongside each crate; this suite is for behavior that
//! only shows up once several crates are wired together -- a transaction
//! moving through `chain-node`'s `check`/`deliver`/`commit` pipeline, a
//! contract's storage surviving a block boundary, a chain reopening its
//! state root after a restart.

pub mod integration;
