//! [`MapCollection`]: a map stored in the store's native hash type.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;

use kvmirror_codec::{Codec, CodecResult, JsonCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::{CollectionError, CollectionResult};
use crate::refresh::Refresh;
use crate::store::{KeyBinding, Store};

/// A map of `K -> V` mirrored to one store hash key.
///
/// Keys and values have independent codecs; each entry is one hash field.
/// Per-entry operations address a single field and leave the cache alone.
pub struct MapCollection<K, V, KC = JsonCodec, VC = JsonCodec> {
    binding: KeyBinding,
    cache: Cache<HashMap<K, V>>,
    key_codec: KC,
    value_codec: VC,
}

impl<K, V> MapCollection<K, V, JsonCodec, JsonCodec>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn new(store: &Store, name: &str) -> CollectionResult<Self> {
        Self::with_codecs(store, name, JsonCodec, JsonCodec)
    }
}

impl<K, V, KC, VC> MapCollection<K, V, KC, VC>
where
    K: Eq + Hash + Clone,
    V: Clone,
    KC: Codec<K>,
    VC: Codec<V>,
{
    pub fn with_codecs(
        store: &Store,
        name: &str,
        key_codec: KC,
        value_codec: VC,
    ) -> CollectionResult<Self> {
        Ok(Self {
            binding: store.bind(name)?,
            cache: Cache::new(HashMap::new()),
            key_codec,
            value_codec,
        })
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn key(&self) -> &str {
        self.binding.key()
    }

    fn decode_entry(&self, field: &str, value: &str) -> CodecResult<(K, V)> {
        Ok((self.key_codec.decode(field)?, self.value_codec.decode(value)?))
    }

    /// Fetch every entry and refresh the cache.
    ///
    /// If any field or value fails to decode, the whole refresh is discarded
    /// and the previous cache is returned as [`Refresh::StaleKept`]. A
    /// missing key is the empty map.
    pub async fn read_all(&self) -> CollectionResult<Refresh<HashMap<K, V>>> {
        let key = self.binding.key();
        let pairs = self.binding.client().hgetall(key).await?;
        let decoded: CodecResult<HashMap<K, V>> = pairs
            .iter()
            .map(|(field, value)| self.decode_entry(field, value))
            .collect();
        match decoded {
            Ok(map) => {
                debug!(key, len = map.len(), "map refreshed");
                self.cache.replace(map.clone());
                Ok(Refresh::Fresh(map))
            }
            Err(error) => {
                warn!(key, %error, "undecodable map entry; keeping cached map");
                Ok(Refresh::StaleKept {
                    value: self.cache.get(),
                    error,
                })
            }
        }
    }

    /// Replace the cache with `map` and set each entry in the store.
    ///
    /// Additive like [`SetCollection::write_all`](crate::SetCollection::write_all):
    /// remote fields not in `map` stay. Returns how many fields were newly
    /// created.
    pub async fn write_all(&self, map: HashMap<K, V>) -> CollectionResult<usize> {
        let key = self.binding.key();
        let encoded = map
            .iter()
            .map(|(k, v)| -> CodecResult<(String, String)> {
                Ok((self.key_codec.encode(k)?, self.value_codec.encode(v)?))
            })
            .collect::<CodecResult<Vec<(String, String)>>>()?;
        self.cache.replace(map);

        let mut created = 0;
        for (field, value) in &encoded {
            if self.binding.client().hset(key, field, value).await? {
                created += 1;
            }
        }
        debug!(key, written = encoded.len(), created, "map written");
        Ok(created)
    }

    /// Set one entry. Returns `true` if the field was newly created.
    pub async fn set(&self, key: &K, value: &V) -> CollectionResult<bool> {
        let field = self.key_codec.encode(key)?;
        let value = self.value_codec.encode(value)?;
        Ok(self
            .binding
            .client()
            .hset(self.binding.key(), &field, &value)
            .await?)
    }

    /// Fetch one entry. `None` means the field does not exist, which is
    /// distinct from any stored value.
    ///
    /// There is no cached fallback for a single entry, so a value that fails
    /// to decode is reported as [`CollectionError::Codec`].
    pub async fn get(&self, key: &K) -> CollectionResult<Option<V>> {
        let field = self.key_codec.encode(key)?;
        match self.binding.client().hget(self.binding.key(), &field).await? {
            Some(text) => Ok(Some(self.value_codec.decode(&text)?)),
            None => Ok(None),
        }
    }

    /// Remove one entry. Returns `true` if it existed.
    pub async fn remove(&self, key: &K) -> CollectionResult<bool> {
        let field = self.key_codec.encode(key)?;
        Ok(self.binding.client().hdel(self.binding.key(), &field).await?)
    }

    /// Delete the whole hash and empty the cache. Returns `true` if the key
    /// existed.
    pub async fn clear(&self) -> CollectionResult<bool> {
        let key = self.binding.key();
        let existed = self.binding.client().del(key).await?;
        self.cache.replace(HashMap::new());
        debug!(key, existed, "map cleared");
        Ok(existed)
    }

    /// Read the whole map, then run `f` on each entry in turn, awaiting each
    /// call before starting the next. Returns the number of entries visited.
    pub async fn for_each<F, Fut>(&self, mut f: F) -> CollectionResult<usize>
    where
        F: FnMut(K, V) -> Fut,
        Fut: Future<Output = ()>,
    {
        let entries = self.read_all().await?.into_value();
        let count = entries.len();
        for (k, v) in entries {
            f(k, v).await;
        }
        Ok(count)
    }

    /// Like [`for_each`](Self::for_each), stopping at the first error.
    pub async fn try_for_each<F, Fut, E>(&self, mut f: F) -> Result<usize, E>
    where
        F: FnMut(K, V) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<CollectionError>,
    {
        let entries = self.read_all().await?.into_value();
        let count = entries.len();
        for (k, v) in entries {
            f(k, v).await?;
        }
        Ok(count)
    }
}

impl<K, V, KC, VC> std::fmt::Debug for MapCollection<K, V, KC, VC> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCollection")
            .field("key", &self.binding.key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use kvmirror_codec::{CodecError, DisplayCodec};
    use kvmirror_store::{InMemoryKvClient, KvClient};

    use super::*;
    use crate::store::Keyspace;

    type Scores = MapCollection<String, i64, DisplayCodec<String>, DisplayCodec<i64>>;

    fn store() -> (Store, Arc<InMemoryKvClient>) {
        let client = Arc::new(InMemoryKvClient::new());
        let store = Store::new(client.clone(), Keyspace::new("test:"));
        (store, client)
    }

    fn scores(store: &Store) -> Scores {
        MapCollection::with_codecs(store, "scores", DisplayCodec::new(), DisplayCodec::new())
            .unwrap()
    }

    fn name(s: &str) -> String {
        s.to_string()
    }

    fn expected(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn scores_scenario() {
        let (store, client) = store();
        let scores = scores(&store);

        scores.set(&name("alice"), &10).await.unwrap();
        scores.set(&name("bob"), &20).await.unwrap();
        assert_eq!(
            scores.read_all().await.unwrap().into_value(),
            expected(&[("alice", 10), ("bob", 20)])
        );
        assert_eq!(
            client.hget("test:scores", "alice").await.unwrap().as_deref(),
            Some("10")
        );

        assert!(scores.remove(&name("alice")).await.unwrap());
        assert_eq!(
            scores.read_all().await.unwrap().into_value(),
            expected(&[("bob", 20)])
        );

        assert!(scores.clear().await.unwrap());
        assert!(scores.read_all().await.unwrap().into_value().is_empty());
    }

    #[tokio::test]
    async fn get_distinguishes_missing_from_zero() {
        let (store, _) = store();
        let scores = scores(&store);
        scores.set(&name("k"), &5).await.unwrap();
        scores.set(&name("zero"), &0).await.unwrap();
        assert_eq!(scores.get(&name("k")).await.unwrap(), Some(5));
        assert_eq!(scores.get(&name("zero")).await.unwrap(), Some(0));
        assert_eq!(scores.get(&name("missing")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_reports_new_fields() {
        let (store, _) = store();
        let scores = scores(&store);
        assert!(scores.set(&name("a"), &1).await.unwrap());
        assert!(!scores.set(&name("a"), &2).await.unwrap());
        assert_eq!(scores.get(&name("a")).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn clear_forgets_every_key() {
        let (store, _) = store();
        let scores = scores(&store);
        scores.set(&name("a"), &1).await.unwrap();
        scores.set(&name("b"), &2).await.unwrap();
        scores.clear().await.unwrap();
        assert!(scores.read_all().await.unwrap().value().is_empty());
        assert_eq!(scores.get(&name("a")).await.unwrap(), None);
        assert_eq!(scores.get(&name("b")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_codec_quotes_fields_and_values() {
        let (store, client) = store();
        let map: MapCollection<String, Vec<u8>> = MapCollection::new(&store, "m").unwrap();
        map.set(&name("k"), &vec![1, 2]).await.unwrap();
        assert_eq!(
            client.hgetall("test:m").await.unwrap(),
            vec![("\"k\"".to_string(), "[1,2]".to_string())]
        );
        assert_eq!(map.get(&name("k")).await.unwrap(), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn write_all_is_additive() {
        let (store, _) = store();
        let scores = scores(&store);
        scores.set(&name("old"), &1).await.unwrap();
        let created = scores
            .write_all(expected(&[("new", 2), ("old", 3)]))
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(
            scores.read_all().await.unwrap().into_value(),
            expected(&[("old", 3), ("new", 2)])
        );
    }

    #[tokio::test]
    async fn bad_value_discards_the_refresh() {
        let (store, client) = store();
        let scores = scores(&store);
        scores.write_all(expected(&[("a", 1)])).await.unwrap();
        client.hset("test:scores", "b", "two").await.unwrap();

        let r = scores.read_all().await.unwrap();
        assert!(r.is_stale());
        assert!(matches!(r.error(), Some(CodecError::Parse { .. })));
        assert_eq!(r.into_value(), expected(&[("a", 1)]));
    }

    #[tokio::test]
    async fn bad_field_discards_the_refresh() {
        let (store, client) = store();
        let map: MapCollection<u32, u32, DisplayCodec<u32>, DisplayCodec<u32>> =
            MapCollection::with_codecs(&store, "m", DisplayCodec::new(), DisplayCodec::new())
                .unwrap();
        map.set(&1, &1).await.unwrap();
        assert_eq!(map.read_all().await.unwrap().value().len(), 1);
        client.hset("test:m", "not-a-number", "2").await.unwrap();
        let r = map.read_all().await.unwrap();
        assert!(r.is_stale());
        assert_eq!(r.value().len(), 1);
    }

    #[tokio::test]
    async fn get_of_undecodable_value_is_an_error() {
        let (store, client) = store();
        let scores = scores(&store);
        client.hset("test:scores", "x", "NaN-ish").await.unwrap();
        assert!(matches!(
            scores.get(&name("x")).await,
            Err(CollectionError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn for_each_visits_every_entry_sequentially() {
        let (store, _) = store();
        let scores = scores(&store);
        scores
            .write_all(expected(&[("a", 1), ("b", 2), ("c", 3)]))
            .await
            .unwrap();

        let active = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        let count = scores
            .for_each(|_, v| {
                let active = Arc::clone(&active);
                let total = Arc::clone(&total);
                async move {
                    assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0, "overlapping call");
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    total.fetch_add(v as usize, Ordering::SeqCst);
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();
        assert_eq!(count, 3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn try_for_each_propagates_collection_errors() {
        let (store, client) = store();
        client.set("test:scores", "blob").await.unwrap();
        let scores = scores(&store);
        let result: Result<usize, CollectionError> =
            scores.try_for_each(|_, _| async { Ok(()) }).await;
        assert!(matches!(result, Err(CollectionError::Store(_))));
    }

    #[tokio::test]
    async fn collections_share_one_connection() {
        let (store, client) = store();
        let a = scores(&store);
        let b: crate::SetCollection<String> = crate::SetCollection::new(&store, "members").unwrap();
        a.set(&name("x"), &1).await.unwrap();
        b.add(&name("x")).await.unwrap();
        assert_eq!(client.keys(), vec!["test:members", "test:scores"]);
    }

    mod over_resp {
        use std::collections::HashMap;

        use kvmirror_codec::DisplayCodec;
        use kvmirror_store::testing::TestServer;
        use kvmirror_store::{KvClient, StoreConfig};

        use super::Scores;
        use crate::map::MapCollection;
        use crate::store::Store;

        #[tokio::test]
        async fn scores_over_the_wire() {
            let server = TestServer::spawn().await;
            let store = Store::connect(&StoreConfig {
                address: server.address.clone(),
                prefix: "test:".into(),
                connect_timeout_ms: 1_000,
                ..Default::default()
            })
            .await
            .unwrap();
            let scores: Scores = MapCollection::with_codecs(
                &store,
                "scores",
                DisplayCodec::new(),
                DisplayCodec::new(),
            )
            .unwrap();

            assert!(scores.set(&"alice".into(), &10).await.unwrap());
            assert!(scores.set(&"bob".into(), &0).await.unwrap());
            assert_eq!(
                server.store.hget("test:scores", "alice").await.unwrap().as_deref(),
                Some("10")
            );
            assert_eq!(scores.get(&"bob".into()).await.unwrap(), Some(0));
            assert_eq!(scores.get(&"carol".into()).await.unwrap(), None);
            assert_eq!(
                scores.read_all().await.unwrap().into_value(),
                HashMap::from([("alice".to_string(), 10), ("bob".to_string(), 0)])
            );
            assert!(scores.remove(&"alice".into()).await.unwrap());
            assert!(scores.clear().await.unwrap());
            assert!(scores.read_all().await.unwrap().into_value().is_empty());
        }
    }
}
