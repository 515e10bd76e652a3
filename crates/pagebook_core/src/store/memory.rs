//! Shared in-memory key-value store.
//!
//! Clones share one backing map, so a second handle behaves like the same
//! device store seen by a fresh application session. Failure injection
//! (`set_available(false)`) lets callers exercise degraded paths.

use crate::store::{KeyValueStore, StoreError, StoreResult, ValueKind};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
enum StoredValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl StoredValue {
    fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    values: BTreeMap<String, StoredValue>,
    unavailable: bool,
    flush_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the backing store going away (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = !available;
        }
    }

    /// Number of successful `flush` calls across all handles.
    pub fn flush_count(&self) -> u64 {
        self.inner.lock().map(|inner| inner.flush_count).unwrap_or(0)
    }

    /// Sorted keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.values.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if inner.unavailable {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(inner)
    }

    fn get_typed<T>(
        &self,
        key: &str,
        expected: ValueKind,
        extract: impl FnOnce(&StoredValue) -> Option<T>,
    ) -> StoreResult<Option<T>> {
        let inner = self.lock()?;
        match inner.values.get(key) {
            None => Ok(None),
            Some(value) => extract(value).map(Some).ok_or(StoreError::TypeMismatch {
                key: key.to_string(),
                expected,
                found: value.kind(),
            }),
        }
    }

    fn set(&self, key: &str, value: StoredValue) -> StoreResult<()> {
        self.lock()?.values.insert(key.to_string(), value);
        Ok(())
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get_string(&self, key: &str) -> StoreResult<Option<String>> {
        self.get_typed(key, ValueKind::String, |value| match value {
            StoredValue::String(text) => Some(text.clone()),
            _ => None,
        })
    }

    fn set_string(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.set(key, StoredValue::String(value.to_string()))
    }

    fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        self.get_typed(key, ValueKind::Int, |value| match value {
            StoredValue::Int(number) => Some(*number),
            _ => None,
        })
    }

    fn set_int(&mut self, key: &str, value: i64) -> StoreResult<()> {
        self.set(key, StoredValue::Int(value))
    }

    fn get_float(&self, key: &str) -> StoreResult<Option<f64>> {
        self.get_typed(key, ValueKind::Float, |value| match value {
            StoredValue::Float(number) => Some(*number),
            _ => None,
        })
    }

    fn set_float(&mut self, key: &str, value: f64) -> StoreResult<()> {
        self.set(key, StoredValue::Float(value))
    }

    fn has_key(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.values.contains_key(key))
    }

    fn delete_key(&mut self, key: &str) -> StoreResult<bool> {
        Ok(self.lock()?.values.remove(key).is_some())
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.lock()?.flush_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryKvStore;
    use crate::store::{KeyValueStore, StoreError, ValueKind};

    #[test]
    fn clones_share_backing_map() {
        let mut first = MemoryKvStore::new();
        let second = first.clone();
        first.set_string("scene", "payload").unwrap();
        assert_eq!(second.get_string("scene").unwrap().as_deref(), Some("payload"));
    }

    #[test]
    fn wrong_accessor_reports_type_mismatch() {
        let mut store = MemoryKvStore::new();
        store.set_int("Object_Count", 3).unwrap();
        let err = store.get_string("Object_Count").unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                expected: ValueKind::String,
                found: ValueKind::Int,
                ..
            }
        ));
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let mut store = MemoryKvStore::new();
        store.set_available(false);
        assert!(matches!(
            store.set_string("k", "v"),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.flush().is_err());
        store.set_available(true);
        assert!(!store.has_key("k").unwrap());
    }
}
