use crate::errors::KvError;
use crate::ports::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory store used by unit and integration tests. `BTreeMap` keeps
/// `prefix_scan` ordered without needing a separate sort pass.
#[derive(Default)]
pub struct MemoryKv {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let kv = MemoryKv::new();
        kv.put(b"a", b"1").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
        kv.delete(b"a").unwrap();
        assert_eq!(kv.get(b"a").unwrap(), None);
    }

    #[test]
    fn batch_is_applied_in_order() {
        let kv = MemoryKv::new();
        kv.put(b"a", b"1").unwrap();
        kv.write_batch(vec![
            BatchOperation::put(b"a".to_vec(), b"2".to_vec()),
            BatchOperation::put(b"b".to_vec(), b"3".to_vec()),
            BatchOperation::delete(b"a".to_vec()),
        ])
        .unwrap();
        assert_eq!(kv.get(b"a").unwrap(), None);
        assert_eq!(kv.get(b"b").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn prefix_scan_returns_matching_keys_only() {
        let kv = MemoryKv::new();
        kv.put(b"acc/1", b"x").unwrap();
        kv.put(b"acc/2", b"y").unwrap();
        kv.put(b"tx/1", b"z").unwrap();
        let scanned = kv.prefix_scan(b"acc/").unwrap();
        assert_eq!(scanned.len(), 2);
    }
}
