use crate::common::hash::HashKeyType;
use crate::common::{StorageResult, ValueType};

/// Multi-map over fixed-width keys and values, persisted through the buffer
/// pool. A key may carry several values; the exact same pair is stored at
/// most once.
pub trait HashTable<K: HashKeyType, V: ValueType> {
    /// `Ok(false)` means the identical pair is already present.
    fn insert(&self, key: &K, value: &V) -> StorageResult<bool>;

    /// Removes the exact pair. `Ok(false)` if it is not present.
    fn remove(&self, key: &K, value: &V) -> StorageResult<bool>;

    /// Every value stored under `key`.
    fn get_value(&self, key: &K) -> StorageResult<Vec<V>>;
}
