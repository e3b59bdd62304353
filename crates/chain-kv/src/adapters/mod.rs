pub mod memory;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use memory::MemoryKv;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
