//! Scoped Overrides
//!
//! An override context assigns temporary entries to a namespace and puts the
//! previous entries back when it ends. Names that did not exist before are
//! deleted again. Restoring goes through the normal write path, so caches
//! computed against the temporary entries are invalidated.
//!
//! The context ends when it is dropped or when [`OverrideContext::exit`] is
//! called. Only `exit` reports restore errors; a drop logs them.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;

use super::namespace::{Entry, Namespace};
use crate::error::Result;

/// Guard holding a namespace with temporary entries in place.
///
/// ```rust
/// use reflex_core::{Entry, Namespace};
///
/// let mut ns: Namespace<i32> = Namespace::new();
/// ns.set("a", 1).unwrap();
/// {
///     let mut scoped = ns.overrides([("a", Entry::Value(2))]).unwrap();
///     assert_eq!(scoped.get("a").unwrap(), 2);
/// }
/// assert_eq!(ns.get("a").unwrap(), 1);
/// ```
pub struct OverrideContext<'a, V: Clone> {
    namespace: &'a mut Namespace<V>,
    /// Entry each overridden name held before, `None` if it was undefined.
    saved: IndexMap<String, Option<Entry<V>>>,
    restored: bool,
}

impl<'a, V: Clone> OverrideContext<'a, V> {
    pub(crate) fn enter<I, S>(namespace: &'a mut Namespace<V>, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Entry<V>)>,
        S: Into<String>,
    {
        let mut context = Self {
            namespace,
            saved: IndexMap::new(),
            restored: false,
        };

        for (name, entry) in entries {
            let name = name.into();
            if !context.saved.contains_key(&name) {
                let prior = context.namespace.entry(&name);
                context.saved.insert(name.clone(), prior);
            }
            // On failure the guard drops here and undoes what was applied.
            context.namespace.set_entry(name, entry)?;
        }

        Ok(context)
    }

    /// Names currently overridden.
    pub fn overridden(&self) -> impl Iterator<Item = &str> + '_ {
        self.saved.keys().map(String::as_str)
    }

    /// Restore the previous entries and return the first error hit.
    ///
    /// Every name is restored even if an earlier one fails.
    pub fn exit(mut self) -> Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        let mut first_error = None;
        while let Some((name, prior)) = self.saved.pop() {
            let result = match prior {
                Some(entry) => self.namespace.set_entry(name, entry),
                None if self.namespace.contains(&name) => self.namespace.delete(&name),
                None => Ok(()),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl<V: Clone> Deref for OverrideContext<'_, V> {
    type Target = Namespace<V>;

    fn deref(&self) -> &Self::Target {
        self.namespace
    }
}

impl<V: Clone> DerefMut for OverrideContext<'_, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.namespace
    }
}

impl<V: Clone> Drop for OverrideContext<'_, V> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(namespace = %self.namespace.id(), error = %err, "failed to restore overridden names");
        }
    }
}

impl<V: Clone> Namespace<V> {
    /// Apply temporary entries until the returned guard ends.
    pub fn overrides<I, S>(&mut self, entries: I) -> Result<OverrideContext<'_, V>>
    where
        I: IntoIterator<Item = (S, Entry<V>)>,
        S: Into<String>,
    {
        OverrideContext::enter(self, entries)
    }

    /// Run `f` with temporary entries applied, then restore.
    ///
    /// An error from `f` takes precedence over a restore error.
    pub fn with_overrides<I, S, T, F>(&mut self, entries: I, f: F) -> Result<T>
    where
        I: IntoIterator<Item = (S, Entry<V>)>,
        S: Into<String>,
        F: FnOnce(&mut Namespace<V>) -> Result<T>,
    {
        let mut context = self.overrides(entries)?;
        let result = f(&mut *context);
        let restored = context.exit();
        let value = result?;
        restored?;
        Ok(value)
    }
}
