//! In-memory stores for tests and hosts without persistence.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::{DataStore, HitStore, StorageError, StoredRecord};

#[derive(Debug, Clone)]
enum Value {
    String(String),
    Long(i64),
}

/// Volatile [`DataStore`].
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl DataStore for MemoryDataStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(match self.values.lock().get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        })
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn get_long(&self, key: &str) -> Result<Option<i64>, StorageError> {
        Ok(match self.values.lock().get(key) {
            Some(Value::Long(v)) => Some(*v),
            _ => None,
        })
    }

    fn set_long(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.values
            .lock()
            .insert(key.to_string(), Value::Long(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        self.values.lock().clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HitLog {
    next_id: i64,
    records: VecDeque<StoredRecord>,
}

/// Volatile [`HitStore`].
#[derive(Debug, Default)]
pub struct MemoryHitStore {
    log: Mutex<HitLog>,
}

impl MemoryHitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every pending record, oldest first.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.log.lock().records.iter().cloned().collect()
    }
}

impl HitStore for MemoryHitStore {
    fn append(&self, data: &str) -> Result<i64, StorageError> {
        let mut log = self.log.lock();
        log.next_id += 1;
        let id = log.next_id;
        log.records.push_back(StoredRecord {
            id,
            data: data.to_string(),
        });
        Ok(id)
    }

    fn peek(&self) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.log.lock().records.front().cloned())
    }

    fn remove(&self, id: i64) -> Result<bool, StorageError> {
        let mut log = self.log.lock();
        let before = log.records.len();
        log.records.retain(|r| r.id != id);
        Ok(log.records.len() != before)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut log = self.log.lock();
        let removed = log.records.len();
        log.records.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        Ok(self.log.lock().records.len())
    }
}
