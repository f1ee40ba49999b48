//! Update hooks for sources.
//!
//! A source whose value changes on its own (a timer, a watched file, user
//! input) notifies every namespace holding it through an [`UpdateHook`].
//! Hooks are keyed by [`SubscriberId`] so a namespace can replace or remove
//! its registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Unique identifier for a hook registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Next id from a process-wide counter. Safe to call from any thread.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked with no arguments when a source's value changes.
pub type UpdateHook = Arc<dyn Fn() + Send + Sync>;

/// Registry of update hooks, for use inside [`Source`](super::Source)
/// implementations.
#[derive(Default)]
pub struct UpdateHooks {
    hooks: Mutex<IndexMap<SubscriberId, UpdateHook>>,
}

impl UpdateHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook, replacing any previous one for the same subscriber.
    pub fn register(&self, id: SubscriberId, hook: UpdateHook) {
        self.hooks.lock().insert(id, hook);
    }

    /// Remove the hook registered for `id`.
    pub fn unregister(&self, id: SubscriberId) {
        self.hooks.lock().shift_remove(&id);
    }

    /// Invoke every registered hook.
    ///
    /// The registry lock is released before any hook runs, so hooks may
    /// register or unregister freely.
    pub fn trigger(&self) {
        let hooks: Vec<UpdateHook> = self.hooks.lock().values().cloned().collect();
        for hook in hooks {
            hook();
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    /// True if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }
}

impl std::fmt::Debug for UpdateHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHooks")
            .field("len", &self.len())
            .finish()
    }
}
