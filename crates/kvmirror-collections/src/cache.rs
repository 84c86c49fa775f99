use std::sync::{PoisonError, RwLock};

/// The in-process copy of a collection's value.
///
/// The lock is held only for the duration of a clone or a swap, never across
/// a store round trip. A poisoned lock still holds a complete value (writers
/// only ever swap whole values), so poisoning is ignored.
pub(crate) struct Cache<T> {
    value: RwLock<T>,
}

impl<T: Clone> Cache<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub(crate) fn get(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace(&self, value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}
