//! [`SetCollection`]: a set stored in the store's native set type.

use std::collections::HashSet;
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

/// A set of `T` mirrored to one store set key.
///
/// Each member is encoded on its own; there is no whole-set envelope. The
/// per-item operations ([`add`](Self::add), [`remove`](Self::remove),
/// [`has`](Self::has)) go straight to the store and leave the cache alone.
pub struct SetCollection<T, C = JsonCodec> {
    binding: KeyBinding,
    cache: Cache<HashSet<T>>,
    codec: C,
}

impl<T> SetCollection<T, JsonCodec>
where
    T: Serialize + DeserializeOwned + Eq + Hash + Clone,
{
    pub fn new(store: &Store, name: &str) -> CollectionResult<Self> {
        Self::with_codec(store, name, JsonCodec)
    }
}

impl<T, C> SetCollection<T, C>
where
    T: Eq + Hash + Clone,
    C: Codec<T>,
{
    pub fn with_codec(store: &Store, name: &str, codec: C) -> CollectionResult<Self> {
        Ok(Self {
            binding: store.bind(name)?,
            cache: Cache::new(HashSet::new()),
            codec,
        })
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn key(&self) -> &str {
        self.binding.key()
    }

    /// Fetch every member and refresh the cache.
    ///
    /// If any member fails to decode, the whole refresh is discarded and the
    /// previous cache is returned as [`Refresh::StaleKept`]. A missing key is
    /// the empty set.
    pub async fn read_all(&self) -> CollectionResult<Refresh<HashSet<T>>> {
        let key = self.binding.key();
        let members = self.binding.client().smembers(key).await?;
        let decoded: CodecResult<HashSet<T>> =
            members.iter().map(|m| self.codec.decode(m)).collect();
        match decoded {
            Ok(set) => {
                debug!(key, len = set.len(), "set refreshed");
                self.cache.replace(set.clone());
                Ok(Refresh::Fresh(set))
            }
            Err(error) => {
                warn!(key, %error, "undecodable set member; keeping cached set");
                Ok(Refresh::StaleKept {
                    value: self.cache.get(),
                    error,
                })
            }
        }
    }

    /// Replace the cache with `set` and add each member to the store.
    ///
    /// This is additive: remote members not in `set` stay. Use
    /// [`clear`](Self::clear) first for a full replacement. Returns how many
    /// members were newly added.
    pub async fn write_all(&self, set: HashSet<T>) -> CollectionResult<usize> {
        let key = self.binding.key();
        let encoded = set
            .iter()
            .map(|item| self.codec.encode(item))
            .collect::<CodecResult<Vec<String>>>()?;
        self.cache.replace(set);

        let mut added = 0;
        for member in &encoded {
            if self.binding.client().sadd(key, member).await? {
                added += 1;
            }
        }
        debug!(key, written = encoded.len(), added, "set written");
        Ok(added)
    }

    /// Add one member. Returns `true` if it was not already present.
    pub async fn add(&self, item: &T) -> CollectionResult<bool> {
        let member = self.codec.encode(item)?;
        Ok(self.binding.client().sadd(self.binding.key(), &member).await?)
    }

    /// Remove one member. Returns `true` if it was present.
    pub async fn remove(&self, item: &T) -> CollectionResult<bool> {
        let member = self.codec.encode(item)?;
        Ok(self.binding.client().srem(self.binding.key(), &member).await?)
    }

    pub async fn has(&self, item: &T) -> CollectionResult<bool> {
        let member = self.codec.encode(item)?;
        Ok(self
            .binding
            .client()
            .sismember(self.binding.key(), &member)
            .await?)
    }

    /// Delete the whole set and empty the cache. Returns `true` if the key
    /// existed.
    pub async fn clear(&self) -> CollectionResult<bool> {
        let key = self.binding.key();
        let existed = self.binding.client().del(key).await?;
        self.cache.replace(HashSet::new());
        debug!(key, existed, "set cleared");
        Ok(existed)
    }

    /// Read the whole set, then run `f` on each member in turn, awaiting
    /// each call before starting the next. Returns the number of members
    /// visited.
    pub async fn for_each<F, Fut>(&self, mut f: F) -> CollectionResult<usize>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        let items = self.read_all().await?.into_value();
        let count = items.len();
        for item in items {
            f(item).await;
        }
        Ok(count)
    }

    /// Like [`for_each`](Self::for_each), stopping at the first error.
    pub async fn try_for_each<F, Fut, E>(&self, mut f: F) -> Result<usize, E>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<CollectionError>,
    {
        let items = self.read_all().await?.into_value();
        let count = items.len();
        for item in items {
            f(item).await?;
        }
        Ok(count)
    }
}

impl<T, C> std::fmt::Debug for SetCollection<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetCollection")
            .field("key", &self.binding.key())
            .finish_non_exhaustive()
    }
}
