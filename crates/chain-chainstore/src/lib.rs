//! Block assembly and the secondary indexes built over committed blocks:
//! `ChainStorage` composes the block currently in progress and commits its
//! header once finalized; `MetaStorage` answers height/hash and
//! transaction/receipt lookups against whatever has already been committed.

pub mod chain;
pub mod errors;
pub mod meta;

pub use chain::ChainStorage;
pub use errors::ChainStoreError;
pub use meta::MetaStorage;
