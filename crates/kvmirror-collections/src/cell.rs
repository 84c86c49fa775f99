//! [`Cell`]: one value stored as a single encoded blob.

use std::future::IntoFuture;

use kvmirror_codec::{Codec, JsonCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::Cache;
use crate::error::CollectionResult;
use crate::refresh::Refresh;
use crate::store::{KeyBinding, Store};

/// A single value of `T` mirrored to one store key (GET/SET/DEL).
///
/// The cached value starts as the default given at construction and then
/// tracks the last successful read or the last write, whichever came last.
pub struct Cell<T, C = JsonCodec> {
    binding: KeyBinding,
    default: T,
    cache: Cache<T>,
    codec: C,
}

impl<T> Cell<T, JsonCodec>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// A cell using the JSON codec.
    pub fn new(store: &Store, name: &str, default: T) -> CollectionResult<Self> {
        Self::with_codec(store, name, default, JsonCodec)
    }
}

impl<T, C> Cell<T, C>
where
    T: Clone,
    C: Codec<T>,
{
    pub fn with_codec(store: &Store, name: &str, default: T, codec: C) -> CollectionResult<Self> {
        Ok(Self {
            binding: store.bind(name)?,
            cache: Cache::new(default.clone()),
            default,
            codec,
        })
    }

    pub fn name(&self) -> &str {
        self.binding.name()
    }

    pub fn key(&self) -> &str {
        self.binding.key()
    }

    /// Fetch the value from the store and refresh the cache.
    ///
    /// A missing key yields the cached value as [`Refresh::Absent`]. Text
    /// that fails to decode leaves the cache untouched and yields
    /// [`Refresh::StaleKept`].
    pub async fn read(&self) -> CollectionResult<Refresh<T>> {
        let key = self.binding.key();
        let Some(text) = self.binding.client().get(key).await? else {
            debug!(key, "cell absent; using cached value");
            return Ok(Refresh::Absent(self.cache.get()));
        };
        match self.codec.decode(&text) {
            Ok(value) => {
                self.cache.replace(value.clone());
                Ok(Refresh::Fresh(value))
            }
            Err(error) => {
                warn!(key, %error, "undecodable cell value; keeping cached value");
                Ok(Refresh::StaleKept {
                    value: self.cache.get(),
                    error,
                })
            }
        }
    }

    /// Replace the cached value and store it.
    ///
    /// Returns once the store acknowledged the SET; nothing is re-read.
    pub async fn write(&self, value: T) -> CollectionResult<()> {
        let key = self.binding.key();
        let text = self.codec.encode(&value)?;
        self.cache.replace(value);
        self.binding.client().set(key, &text).await?;
        debug!(key, len = text.len(), "cell written");
        Ok(())
    }

    /// Await a value that is still being computed, then [`write`](Self::write) it.
    pub async fn write_with<F>(&self, pending: F) -> CollectionResult<()>
    where
        F: IntoFuture<Output = T>,
    {
        let value = pending.await;
        self.write(value).await
    }

    /// Delete the key and reset the cache to the default value.
    ///
    /// Returns `true` if the key existed.
    pub async fn clear(&self) -> CollectionResult<bool> {
        let key = self.binding.key();
        let existed = self.binding.client().del(key).await?;
        self.cache.replace(self.default.clone());
        debug!(key, existed, "cell cleared");
        Ok(existed)
    }
}

impl<T, C> std::fmt::Debug for Cell<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("key", &self.binding.key())
            .finish_non_exhaustive()
    }
}
