//! Backing-store clients for kvmirror.
//!
//! The collections in `kvmirror-collections` need three kinds of value per
//! key -- a single text blob, a set of text members, and a hash of text
//! fields -- and nothing else. This crate captures exactly that command
//! surface as the [`KvClient`] trait and ships two implementations:
//!
//! - [`InMemoryKvClient`] -- `HashMap`-based store for tests and embedding
//! - [`RespClient`] -- a single TCP connection speaking RESP2 to a
//!   Redis-compatible server, reconnecting after the connection breaks
//!
//! # Design Rules
//!
//! 1. One client per process, shared behind an `Arc` by every collection.
//! 2. Each trait method is exactly one store command and one round trip.
//! 3. Transport failures are returned to the caller, never retried here.
//!    A broken or abandoned connection is replaced on the next command.
//! 4. A missing key is not an error: it reads as `None` or as empty.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod resp;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod traits;

pub use client::RespClient;
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryKvClient;
pub use resp::Frame;
pub use traits::KvClient;
