/*!
 * In-Memory Store
 */

use super::DataStore;
use crate::core::errors::NetworkResult;
use ahash::RandomState;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// DashMap-backed store, shared between clones
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Value, RandomState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DataStore for MemoryStore {
    fn put(&self, key: &str, value: Value) -> NetworkResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> NetworkResult<Option<Value>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn delete(&self, key: &str) -> NetworkResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn list(&self, prefix: &str) -> NetworkResult<Vec<(String, Value)>> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}
