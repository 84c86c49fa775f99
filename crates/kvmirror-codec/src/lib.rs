//! Text codecs for kvmirror.
//!
//! Every unit of data that crosses the store boundary -- a cell's whole
//! value, one set member, one hash field or hash value -- is converted to
//! and from text by a [`Codec`]. Codecs are pure: they never touch the store.
//!
//! # Built-in codecs
//!
//! - [`JsonCodec`] -- structured JSON text for any `serde` type (the default)
//! - [`DisplayCodec`] -- the `Display` / `FromStr` form, so `42` is stored as
//!   `42` instead of a JSON document and a `String` is stored verbatim
//! - [`FnCodec`] -- a consumer-supplied pair of functions
//!
//! # Round-trip law
//!
//! For every codec and every value `v` in its domain,
//! `decode(encode(v)) == v`. Decoding foreign text fails with a
//! [`CodecError`]; it is up to the caller whether that failure is fatal.

pub mod codec;
pub mod display;
pub mod error;
pub mod json;

pub use codec::{Codec, FnCodec};
pub use display::DisplayCodec;
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
