//! Codec based on `Display` and `FromStr`.

use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};

/// Stores a value as its `Display` text and reads it back with `FromStr`.
///
/// Use this where the natural text form differs from JSON: numbers that
/// other tools write as bare digits, or strings that should be stored
/// verbatim rather than quoted.
///
/// The round-trip law holds whenever `T::from_str(&v.to_string()) == Ok(v)`,
/// which is true for the integer types, `bool`, `char` and `String`.
pub struct DisplayCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DisplayCodec<T> {
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DisplayCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for DisplayCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DisplayCodec<T> {}

impl<T> fmt::Debug for DisplayCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DisplayCodec")
    }
}

impl<T> Codec<T> for DisplayCodec<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    fn encode(&self, value: &T) -> CodecResult<String> {
        Ok(value.to_string())
    }

    fn decode(&self, text: &str) -> CodecResult<T> {
        text.parse().map_err(|e: T::Err| CodecError::Parse {
            input: text.to_string(),
            reason: e.to_string(),
        })
    }
}
