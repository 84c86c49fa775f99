//! The outcome of a best-effort bulk read.

use kvmirror_codec::CodecError;

/// What a bulk read found, together with the value the caller should use.
///
/// Bulk reads never fail because of bad remote data. Instead they keep the
/// previously cached value and report the decode error alongside it, so the
/// stale-data path can be observed and tested.
#[derive(Debug)]
pub enum Refresh<T> {
    /// The store held decodable data; the cache now equals it.
    Fresh(T),
    /// The key does not exist; the cached value is returned unchanged.
    Absent(T),
    /// The store held data that failed to decode; the cache was kept.
    StaleKept { value: T, error: CodecError },
}

impl<T> Refresh<T> {
    /// The value to use, whatever the outcome.
    pub fn value(&self) -> &T {
        match self {
            Refresh::Fresh(v) | Refresh::Absent(v) => v,
            Refresh::StaleKept { value, .. } => value,
        }
    }

    /// Consume the outcome, keeping only the value.
    pub fn into_value(self) -> T {
        match self {
            Refresh::Fresh(v) | Refresh::Absent(v) => v,
            Refresh::StaleKept { value, .. } => value,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Refresh::Fresh(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Refresh::Absent(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Refresh::StaleKept { .. })
    }

    /// The decode error, if the refresh was discarded.
    pub fn error(&self) -> Option<&CodecError> {
        match self {
            Refresh::StaleKept { error, .. } => Some(error),
            _ => None,
        }
    }
}
