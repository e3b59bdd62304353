//! Production key-value store backed by RocksDB.

use crate::errors::KvError;
use crate::ports::{BatchOperation, KeyValueStore};
use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::Path;
use tracing::info;

pub struct RocksDbConfig {
    pub path: String,
    pub block_cache_size: usize,
    pub write_buffer_size: usize,
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/chain-db".to_string(),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

pub struct RocksDbStore {
    db: DB,
    sync_writes: bool,
}

impl RocksDbStore {
    pub fn open(config: RocksDbConfig) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
        opts.set_write_buffer_size(config.write_buffer_size);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| KvError::Io {
            message: format!("failed to open rocksdb at {}: {e}", config.path),
        })?;

        info!(path = %config.path, sync_writes = config.sync_writes, "opened rocksdb store");

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KvError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db.get(key).map_err(|e| KvError::Io {
            message: format!("rocksdb get failed: {e}"),
        })
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.put_opt(key, value, &opts).map_err(|e| KvError::Io {
            message: format!("rocksdb put failed: {e}"),
        })
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db.delete_opt(key, &opts).map_err(|e| KvError::Io {
            message: format!("rocksdb delete failed: {e}"),
        })
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db
            .write_opt(batch, &write_opts)
            .map_err(|e| KvError::Io {
                message: format!("rocksdb batch write failed: {e}"),
            })
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| KvError::Io {
                message: format!("rocksdb scan failed: {e}"),
            })?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }
}
