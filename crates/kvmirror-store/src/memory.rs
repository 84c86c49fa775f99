//! In-memory store for tests and embedding.
//!
//! [`InMemoryKvClient`] keeps every key in a `HashMap` behind a `RwLock` and
//! follows the same value-kind rules as a Redis server: `SET` overwrites any
//! kind, set and hash commands refuse keys of another kind, and a set or
//! hash that loses its last element disappears.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::KvClient;

#[derive(Debug, Clone)]
enum Value {
    Blob(String),
    Set(HashSet<String>),
    Hash(HashMap<String, String>),
}

/// An in-memory implementation of [`KvClient`].
///
/// Data is lost when the client is dropped. Every command increments a
/// counter so tests can assert how many round trips an operation made.
pub struct InMemoryKvClient {
    data: RwLock<HashMap<String, Value>>,
    commands: AtomicU64,
}

impl InMemoryKvClient {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            commands: AtomicU64::new(0),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .read()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Total number of commands served so far.
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    fn read_data(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        self.data
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_data(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        self.data
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryKvClient {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

#[async_trait]
impl KvClient for InMemoryKvClient {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.read_data()?.get(key) {
            None => Ok(None),
            Some(Value::Blob(text)) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.write_data()?
            .insert(key.to_string(), Value::Blob(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        Ok(self.write_data()?.remove(key).is_some())
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        match self.read_data()?.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.write_data()?;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(members) => Ok(members.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut data = self.write_data()?;
        let Entry::Occupied(mut entry) = data.entry(key.to_string()) else {
            return Ok(false);
        };
        let Value::Set(members) = entry.get_mut() else {
            return Err(wrong_type(key));
        };
        let removed = members.remove(member);
        if members.is_empty() {
            entry.remove();
        }
        Ok(removed)
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        match self.read_data()?.get(key) {
            None => Ok(false),
            Some(Value::Set(members)) => Ok(members.contains(member)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        match self.read_data()?.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(fields)) => Ok(fields
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut data = self.write_data()?;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()))
        {
            Value::Hash(fields) => Ok(fields
                .insert(field.to_string(), value.to_string())
                .is_none()),
            _ => Err(wrong_type(key)),
        }
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        match self.read_data()?.get(key) {
            None => Ok(None),
            Some(Value::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let mut data = self.write_data()?;
        let Entry::Occupied(mut entry) = data.entry(key.to_string()) else {
            return Ok(false);
        };
        let Value::Hash(fields) = entry.get_mut() else {
            return Err(wrong_type(key));
        };
        let removed = fields.remove(field).is_some();
        if fields.is_empty() {
            entry.remove();
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for InMemoryKvClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvClient")
            .field("key_count", &self.len())
            .field("commands", &self.command_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let store = InMemoryKvClient::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = InMemoryKvClient::new();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn set_overwrites_other_kinds() {
        let store = InMemoryKvClient::new();
        store.sadd("k", "a").await.unwrap();
        store.set("k", "blob").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("blob"));
    }

    #[tokio::test]
    async fn del_reports_existence() {
        let store = InMemoryKvClient::new();
        store.set("k", "v").await.unwrap();
        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Sets
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sadd_reports_new_members_only() {
        let store = InMemoryKvClient::new();
        assert!(store.sadd("s", "a").await.unwrap());
        assert!(!store.sadd("s", "a").await.unwrap());
        assert!(store.sismember("s", "a").await.unwrap());
        assert!(!store.sismember("s", "b").await.unwrap());
    }

    #[tokio::test]
    async fn smembers_missing_key_is_empty() {
        let store = InMemoryKvClient::new();
        assert!(store.smembers("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn srem_last_member_removes_key() {
        let store = InMemoryKvClient::new();
        store.sadd("s", "a").await.unwrap();
        assert!(store.srem("s", "a").await.unwrap());
        assert!(!store.srem("s", "a").await.unwrap());
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn set_commands_reject_blob_keys() {
        let store = InMemoryKvClient::new();
        store.set("k", "v").await.unwrap();
        assert!(matches!(
            store.sadd("k", "a").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.smembers("k").await,
            Err(StoreError::WrongType { .. })
        ));
        assert!(matches!(
            store.srem("k", "a").await,
            Err(StoreError::WrongType { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Hashes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn hset_reports_new_fields_only() {
        let store = InMemoryKvClient::new();
        assert!(store.hset("h", "f", "1").await.unwrap());
        assert!(!store.hset("h", "f", "2").await.unwrap());
        assert_eq!(store.hget("h", "f").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.hget("h", "g").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hgetall_lists_pairs() {
        let store = InMemoryKvClient::new();
        store.hset("h", "a", "1").await.unwrap();
        store.hset("h", "b", "2").await.unwrap();
        let mut pairs = store.hgetall("h").await.unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![("a".into(), "1".into()), ("b".into(), "2".into())]
        );
    }

    #[tokio::test]
    async fn hdel_last_field_removes_key() {
        let store = InMemoryKvClient::new();
        store.hset("h", "a", "1").await.unwrap();
        assert!(store.hdel("h", "a").await.unwrap());
        assert!(!store.hdel("h", "a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_rejects_hash_keys() {
        let store = InMemoryKvClient::new();
        store.hset("h", "a", "1").await.unwrap();
        assert!(matches!(
            store.get("h").await,
            Err(StoreError::WrongType { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn counts_commands() {
        let store = InMemoryKvClient::new();
        store.set("a", "1").await.unwrap();
        store.get("a").await.unwrap();
        store.del("a").await.unwrap();
        assert_eq!(store.command_count(), 3);
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let store: Arc<dyn KvClient> = Arc::new(InMemoryKvClient::new());
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", InMemoryKvClient::new());
        assert!(debug.contains("InMemoryKvClient"));
        assert!(debug.contains("key_count"));
    }
}
