//! In-memory parameter store for testing.

use crate::error::{StoreError, StoreResult};
use crate::store::{ConfigStore, Param};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};

/// A write recorded by [`MemoryConfigStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    /// Owner the write was attributed to.
    pub owner: String,
    /// Parameter name.
    pub name: String,
    /// Value written.
    pub value: String,
}

/// An in-memory parameter store.
///
/// Every successful `set` is appended to a write log so tests can assert
/// on exactly what the sync engine persisted, and in which order.
///
/// # Example
///
/// ```rust
/// use rfc_store::{ConfigStore, MemoryConfigStore};
///
/// let store = MemoryConfigStore::new().with_entry("Device.A", "1");
/// store.set("rfc", "Device.B", "2").unwrap();
/// assert_eq!(store.write_count(), 1);
/// assert_eq!(store.value("Device.A").as_deref(), Some("1"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, String>>,
    defaults: RwLock<BTreeMap<String, String>>,
    writes: RwLock<Vec<StoreWrite>>,
    rejected: RwLock<HashSet<String>>,
    unreadable: RwLock<HashSet<String>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a stored value without recording a write.
    #[must_use]
    pub fn with_entry(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Seeds a default value without recording a write.
    #[must_use]
    pub fn with_default(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.write().insert(name.into(), value.into());
        self
    }

    /// Inserts a stored value without recording a write.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(name.into(), value.into());
    }

    /// Removes a stored value.
    pub fn remove(&self, name: &str) {
        self.values.write().remove(name);
    }

    /// Makes every subsequent `set` of `name` fail.
    pub fn reject_writes_to(&self, name: impl Into<String>) {
        self.rejected.write().insert(name.into());
    }

    /// Makes every subsequent `get` of `name` fail.
    pub fn fail_reads_of(&self, name: impl Into<String>) {
        self.unreadable.write().insert(name.into());
    }

    /// Returns the stored (non-default) value, if any.
    pub fn value(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    /// Returns all recorded writes in order.
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.writes.read().clone()
    }

    /// Returns the recorded writes for one parameter.
    pub fn writes_to(&self, name: &str) -> Vec<StoreWrite> {
        self.writes
            .read()
            .iter()
            .filter(|w| w.name == name)
            .cloned()
            .collect()
    }

    /// Returns the number of recorded writes.
    pub fn write_count(&self) -> usize {
        self.writes.read().len()
    }

    /// Forgets recorded writes, keeping values.
    pub fn clear_writes(&self) {
        self.writes.write().clear();
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, name: &str) -> StoreResult<Option<Param>> {
        if self.unreadable.read().contains(name) {
            return Err(StoreError::Failure(format!("read of {name} refused")));
        }
        if let Some(v) = self.values.read().get(name) {
            return Ok(Some(Param::stored(v.clone())));
        }
        Ok(self
            .defaults
            .read()
            .get(name)
            .map(|v| Param::default_value(v.clone())))
    }

    fn set(&self, owner: &str, name: &str, value: &str) -> StoreResult<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidParameterName(name.to_string()));
        }
        if self.rejected.read().contains(name) {
            return Err(StoreError::Failure(format!("write to {name} refused")));
        }
        self.values
            .write()
            .insert(name.to_string(), value.to_string());
        self.writes.write().push(StoreWrite {
            owner: owner.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReadSource;

    #[test]
    fn memory_get_missing() {
        let store = MemoryConfigStore::new();
        assert!(store.get("Device.Missing").unwrap().is_none());
    }

    #[test]
    fn memory_set_records_write() {
        let store = MemoryConfigStore::new();
        store.set("rfc", "Device.X", "1").unwrap();
        store.set("ConfigSetHash", "Device.Y", "abc").unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].owner, "rfc");
        assert_eq!(writes[1].name, "Device.Y");
        assert_eq!(store.value("Device.Y").as_deref(), Some("abc"));
    }

    #[test]
    fn memory_seed_is_not_a_write() {
        let store = MemoryConfigStore::new().with_entry("Device.X", "1");
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.get_value("Device.X").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn memory_default_layer() {
        let store = MemoryConfigStore::new().with_default("Device.Sel", "prod");
        let p = store.get("Device.Sel").unwrap().unwrap();
        assert_eq!(p.source, ReadSource::Default);
        assert_eq!(p.value, "prod");

        store.set("rfc", "Device.Sel", "ci").unwrap();
        let p = store.get("Device.Sel").unwrap().unwrap();
        assert_eq!(p.source, ReadSource::Stored);
        assert_eq!(p.value, "ci");
    }

    #[test]
    fn memory_rejected_write() {
        let store = MemoryConfigStore::new();
        store.reject_writes_to("Device.Locked");
        assert!(store.set("rfc", "Device.Locked", "1").is_err());
        assert!(store.value("Device.Locked").is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn memory_empty_name_rejected() {
        let store = MemoryConfigStore::new();
        let err = store.set("rfc", "", "1").unwrap_err();
        assert!(matches!(err, StoreError::InvalidParameterName(_)));
    }

    #[test]
    fn memory_failed_read() {
        let store = MemoryConfigStore::new().with_entry("Device.X", "1");
        store.fail_reads_of("Device.X");
        assert!(store.get("Device.X").is_err());
    }

    #[test]
    fn memory_quoted_value() {
        let store = MemoryConfigStore::new().with_entry("Device.Q", "\"quoted\"");
        assert_eq!(store.get_value("Device.Q").unwrap().as_deref(), Some("quoted"));
    }
}
