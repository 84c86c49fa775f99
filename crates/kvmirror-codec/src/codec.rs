//! The [`Codec`] trait and the closure-backed [`FnCodec`].

use std::fmt;
use std::sync::Arc;

use crate::error::CodecResult;

/// Converts values of `T` to and from the text stored in the backing store.
///
/// Implementations must satisfy the round-trip law: for every `v` in the
/// codec's domain, `decode(&encode(&v)?)` yields a value equal to `v`.
/// `decode` must accept every string `encode` can produce; anything else may
/// be rejected.
pub trait Codec<T>: Send + Sync {
    /// Encode a value into its stored text form.
    fn encode(&self, value: &T) -> CodecResult<String>;

    /// Decode stored text back into a value.
    fn decode(&self, text: &str) -> CodecResult<T>;
}

impl<T, C> Codec<T> for Arc<C>
where
    C: Codec<T> + ?Sized,
{
    fn encode(&self, value: &T) -> CodecResult<String> {
        (**self).encode(value)
    }

    fn decode(&self, text: &str) -> CodecResult<T> {
        (**self).decode(text)
    }
}

type EncodeFn<T> = dyn Fn(&T) -> String + Send + Sync;
type DecodeFn<T> = dyn Fn(&str) -> CodecResult<T> + Send + Sync;

/// A codec assembled from a pair of functions.
///
/// Encoding is infallible; decoding reports rejected text through
/// [`CodecError`](crate::CodecError).
///
/// ```
/// use kvmirror_codec::{Codec, CodecError, FnCodec};
///
/// let hex = FnCodec::new(
///     |v: &u32| format!("{v:x}"),
///     |s| u32::from_str_radix(s, 16).map_err(CodecError::invalid),
/// );
/// assert_eq!(hex.encode(&255).unwrap(), "ff");
/// assert_eq!(hex.decode("ff").unwrap(), 255);
/// ```
pub struct FnCodec<T> {
    encode: Box<EncodeFn<T>>,
    decode: Box<DecodeFn<T>>,
}

impl<T> FnCodec<T> {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> String + Send + Sync + 'static,
        D: Fn(&str) -> CodecResult<T> + Send + Sync + 'static,
    {
        Self {
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }
}

impl<T> Codec<T> for FnCodec<T> {
    fn encode(&self, value: &T) -> CodecResult<String> {
        Ok((self.encode)(value))
    }

    fn decode(&self, text: &str) -> CodecResult<T> {
        (self.decode)(text)
    }
}

impl<T> fmt::Debug for FnCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}
