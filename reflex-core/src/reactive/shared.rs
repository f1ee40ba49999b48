//! Thread-shared namespace handle.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::descriptor::Descriptor;
use super::namespace::Namespace;
use super::options::Options;
use crate::error::Result;

/// A [`Namespace`] behind a lock, cheap to clone and send across threads.
///
/// Each method takes the lock for one operation. Use [`lock`](Self::lock)
/// to run several operations as a unit.
pub struct SharedNamespace<V> {
    inner: Arc<Mutex<Namespace<V>>>,
}

impl<V: Clone> SharedNamespace<V> {
    /// Create an empty shared namespace with default options.
    pub fn new() -> Self {
        Self::from_namespace(Namespace::new())
    }

    /// Create an empty shared namespace.
    pub fn with_options(options: Options) -> Self {
        Self::from_namespace(Namespace::with_options(options))
    }

    /// Share an existing namespace.
    pub fn from_namespace(namespace: Namespace<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(namespace)),
        }
    }

    /// Exclusive access until the guard is dropped.
    pub fn lock(&self) -> MutexGuard<'_, Namespace<V>> {
        self.inner.lock()
    }

    pub fn get(&self, name: &str) -> Result<V> {
        self.inner.lock().get(name)
    }

    pub fn set(&self, name: impl Into<String>, value: V) -> Result<()> {
        self.inner.lock().set(name, value)
    }

    pub fn define(&self, name: impl Into<String>, descriptor: impl Into<Descriptor<V>>) -> Result<()> {
        self.inner.lock().define(name, descriptor)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.inner.lock().delete(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().contains(name)
    }

    /// Recalculate names whose source reported a change.
    pub fn poll_sources(&self) -> Result<usize> {
        self.inner.lock().poll_sources()
    }
}

impl<V: Clone> Default for SharedNamespace<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for SharedNamespace<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for SharedNamespace<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedNamespace").field(&*self.inner.lock()).finish()
    }
}
