//! Shared plumbing: the client handle, the key prefix, and per-collection
//! key bindings.

use std::fmt;
use std::sync::Arc;

use kvmirror_store::config::DEFAULT_PREFIX;
use kvmirror_store::{InMemoryKvClient, KvClient, RespClient, StoreConfig};

use crate::error::{CollectionError, CollectionResult};

/// The process-wide key prefix.
///
/// Every store key is `<prefix><logical-name>`, which keeps collection keys
/// apart from unrelated data in the same store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The store key for a logical name.
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Handle passed to every collection constructor.
///
/// Cloning is cheap: all clones share one client, and so one connection.
#[derive(Clone)]
pub struct Store {
    client: Arc<dyn KvClient>,
    keyspace: Keyspace,
}

impl Store {
    pub fn new(client: Arc<dyn KvClient>, keyspace: Keyspace) -> Self {
        Self { client, keyspace }
    }

    /// A store backed by a fresh [`InMemoryKvClient`] with the default prefix.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKvClient::new()), Keyspace::default())
    }

    /// Open the single RESP connection described by `config`.
    pub async fn connect(config: &StoreConfig) -> CollectionResult<Self> {
        let client = RespClient::connect(config).await?;
        Ok(Self::new(Arc::new(client), Keyspace::new(&config.prefix)))
    }

    pub fn client(&self) -> &Arc<dyn KvClient> {
        &self.client
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Bind a logical name to its namespaced key on this store.
    pub fn bind(&self, name: &str) -> CollectionResult<KeyBinding> {
        if name.is_empty() {
            return Err(CollectionError::InvalidName(name.to_string()));
        }
        Ok(KeyBinding {
            name: name.to_string(),
            key: self.keyspace.key(name),
            client: Arc::clone(&self.client),
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}

/// A logical name, its store key, and the client to reach it.
///
/// Embedded by every collection; never renamed after construction.
#[derive(Clone)]
pub struct KeyBinding {
    name: String,
    key: String,
    client: Arc<dyn KvClient>,
}

impl KeyBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn client(&self) -> &dyn KvClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBinding")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
