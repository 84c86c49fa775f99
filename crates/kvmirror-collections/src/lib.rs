//! Typed collections mirrored to a remote key-value store.
//!
//! Each collection owns one store key and keeps an in-process copy of what
//! it last read or wrote:
//!
//! - [`Cell`] -- one value stored as a single encoded blob
//! - [`SetCollection`] -- a set stored in the store's native set type, one
//!   encoded member per element
//! - [`MapCollection`] -- a map stored in the store's native hash type, with
//!   independently encoded fields and values
//!
//! All collections are built from a [`Store`], which carries the shared
//! client connection and the process-wide key prefix.
//!
//! # Read/write contract
//!
//! 1. Every operation is one or more round trips to the store; there is no
//!    cache-only read and no write-behind.
//! 2. Bulk reads that find undecodable data keep the previous cached value
//!    and say so through [`Refresh::StaleKept`] instead of failing.
//! 3. Bulk writes of sets and maps are additive: they never remove remote
//!    elements missing from the written collection. Call `clear` first for a
//!    full replacement.
//! 4. Transport failures are returned as [`CollectionError::Store`].
//!
//! ```
//! # tokio_test_block(async {
//! use kvmirror_collections::{MapCollection, Store};
//!
//! let store = Store::in_memory();
//! let scores: MapCollection<String, u32> = MapCollection::new(&store, "scores").unwrap();
//! scores.set(&"alice".to_string(), &10).await.unwrap();
//! assert_eq!(scores.get(&"alice".to_string()).await.unwrap(), Some(10));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod cache;
pub mod cell;
pub mod error;
pub mod map;
pub mod refresh;
pub mod set;
pub mod store;

pub use cell::Cell;
pub use error::{CollectionError, CollectionResult};
pub use map::MapCollection;
pub use refresh::Refresh;
pub use set::SetCollection;
pub use store::{KeyBinding, Keyspace, Store};

pub use kvmirror_codec::{Codec, CodecError, DisplayCodec, FnCodec, JsonCodec};
pub use kvmirror_store::{InMemoryKvClient, KvClient, RespClient, StoreConfig, StoreError};
