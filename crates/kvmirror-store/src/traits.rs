//! The [`KvClient`] trait: the command surface kvmirror needs from a store.

use async_trait::async_trait;

use crate::error::StoreResult;

/// A key-value store offering a text blob, a set and a hash per key.
///
/// Every method is a single command against a single key and must be atomic
/// at the store. Implementations must be shareable across tasks
/// (`Send + Sync`); callers hold them as `Arc<dyn KvClient>`.
///
/// Reading a key that holds a different kind of value fails with
/// [`StoreError::WrongType`](crate::StoreError::WrongType). Reading a
/// missing key is never an error.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// GET: the blob stored at `key`, or `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// SET: replace whatever is stored at `key` with a blob.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// DEL: remove `key` entirely. Returns `true` if it existed.
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// SMEMBERS: all members of the set at `key`, in no particular order.
    /// A missing key is an empty set.
    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// SADD: add one member. Returns `true` if it was not already present.
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// SREM: remove one member. Returns `true` if it was present.
    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// SISMEMBER: whether `member` is in the set at `key`.
    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// HGETALL: every field/value pair of the hash at `key`.
    /// A missing key is an empty hash.
    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>>;

    /// HSET: set one field. Returns `true` if the field was newly created.
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool>;

    /// HGET: the value of one field, or `None`.
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// HDEL: remove one field. Returns `true` if it existed.
    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool>;
}
