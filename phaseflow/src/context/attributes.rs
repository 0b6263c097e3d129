//! Typed key-value storage scoped to a run.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed key into [`Attributes`].
///
/// Keys are identified by name. Reading a key with a different value type
/// than the one stored under that name yields `None`.
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Creates a key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeKey").field(&self.name).finish()
    }
}

type Value = Arc<dyn Any + Send + Sync>;

/// A thread-safe typed attribute map.
///
/// Each run owns one; it is dropped with the run.
#[derive(Default)]
pub struct Attributes {
    values: RwLock<HashMap<&'static str, Value>>,
}

impl Attributes {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous value under the same name.
    pub fn put<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>, value: T) {
        self.values.write().insert(key.name, Arc::new(value));
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        let value = self.values.read().get(key.name).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Returns the value for a key, storing the result of `init` if absent.
    pub fn compute_if_absent<T, F>(&self, key: &AttributeKey<T>, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get(key) {
            return existing;
        }
        let mut values = self.values.write();
        if let Some(existing) = values
            .get(key.name)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
        {
            return existing;
        }
        let created = Arc::new(init());
        values.insert(key.name, Arc::clone(&created) as Value);
        created
    }

    /// Removes a value, returning it if it had the requested type.
    pub fn remove<T: Send + Sync + 'static>(&self, key: &AttributeKey<T>) -> Option<Arc<T>> {
        let value = self.values.write().remove(key.name)?;
        value.downcast::<T>().ok()
    }

    /// Returns true if any value is stored under the key's name.
    #[must_use]
    pub fn contains<T>(&self, key: &AttributeKey<T>) -> bool {
        self.values.read().contains_key(key.name)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Returns the stored key names.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        self.values.read().keys().copied().collect()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: AttributeKey<String> = AttributeKey::new("user");
    const RETRIES: AttributeKey<u32> = AttributeKey::new("retries");

    #[test]
    fn test_put_and_get() {
        let attributes = Attributes::new();
        attributes.put(&USER, "alice".to_string());

        assert_eq!(attributes.get(&USER).as_deref(), Some(&"alice".to_string()));
        assert!(attributes.get(&RETRIES).is_none());
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn test_type_mismatch_reads_none() {
        let attributes = Attributes::new();
        let wrong: AttributeKey<u32> = AttributeKey::new("user");
        attributes.put(&USER, "alice".to_string());

        assert!(attributes.contains(&wrong));
        assert!(attributes.get(&wrong).is_none());
    }

    #[test]
    fn test_compute_if_absent_runs_once() {
        let attributes = Attributes::new();
        let first = attributes.compute_if_absent(&RETRIES, || 3);
        let second = attributes.compute_if_absent(&RETRIES, || 7);

        assert_eq!(*first, 3);
        assert_eq!(*second, 3);
    }

    #[test]
    fn test_remove() {
        let attributes = Attributes::new();
        attributes.put(&RETRIES, 1);

        assert_eq!(attributes.remove(&RETRIES).as_deref(), Some(&1));
        assert!(attributes.is_empty());
    }
}
