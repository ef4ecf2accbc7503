//! Storage trait definition.
//!
//! Defines the mapping contract a kv backend exposes: lookup, assignment,
//! deletion, membership, length, and key iteration.

use crate::core::Key;
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A persistent mapping from [`Key`]s to serializable values.
///
/// Values are encoded on write and decoded on every read; implementations
/// keep no in-memory copy of the entries.
pub trait KeyValueStore {
    /// Lazy iterator over the keys present in the store.
    type Keys<'a>: Iterator<Item = Result<Key>>
    where
        Self: 'a;

    /// Looks up the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent and `Decode` if the stored
    /// value cannot be decoded as `V`.
    fn get<K, V>(&self, key: K) -> Result<V>
    where
        K: Into<Key>,
        V: DeserializeOwned;

    /// Looks up `key`, returning `None` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the value cannot be decoded.
    fn try_get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: Into<Key>,
        V: DeserializeOwned;

    /// Looks up `key`, returning `fallback` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the value cannot be decoded.
    fn get_or<K, V>(&self, key: K, fallback: V) -> Result<V>
    where
        K: Into<Key>,
        V: DeserializeOwned,
    {
        Ok(self.try_get(key)?.unwrap_or(fallback))
    }

    /// Returns true if `key` has an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn contains<K: Into<Key>>(&self, key: K) -> Result<bool>;

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn len(&self) -> Result<usize>;

    /// Returns true if there are no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterates over the keys. Each call starts a fresh scan.
    fn keys(&self) -> Self::Keys<'_>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `LockContention` if the write reservation cannot be acquired
    /// and `Serialization` if the value cannot be encoded.
    fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: Into<Key>,
        V: Serialize + ?Sized;

    /// Removes the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the key is absent.
    fn delete<K: Into<Key>>(&self, key: K) -> Result<()>;
}
