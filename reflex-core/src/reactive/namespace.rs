//! Reactive Namespace
//!
//! A namespace maps names to either literal values or descriptors. Reading a
//! derived name computes it from the names it references, caches the result
//! and records which names were read. Writing a name drops every cached value
//! that was computed from it, directly or through other names.
//!
//! # How It Works
//!
//! 1. `get(n)` returns the cached value of `n` if there is one.
//!
//! 2. Otherwise the stored descriptor is evaluated. Every name it references
//!    is read first, recursively, through this same path.
//!
//! 3. The result is cached and the dependency edges of `n` are replaced by
//!    the names read this time. Edges are never declared up front.
//!
//! 4. `set(n, v)` removes `n` and everything downstream of it from the cache,
//!    clears the edges of `n` and stores the new entry.
//!
//! 5. In eager mode the write then reads every downstream name that nothing
//!    else reads. Those reads recompute everything in between, so errors
//!    surface during the write instead of on a later read.
//!
//! # Cycles
//!
//! Names that reference each other cannot be computed. Each nested evaluation
//! counts towards [`Options::recursion_limit`]; crossing it fails the read
//! with [`Error::RecursionLimit`] and nothing is cached or recorded.
//!
//! Nested evaluation runs on the calling thread's stack. Values are boxed
//! between levels, so the stack used per level does not depend on the size
//! of `V`, but a very high limit on a small thread stack can still overflow.
//!
//! # Thread Safety
//!
//! A namespace is plain exclusively-owned state. Wrap it in a
//! [`SharedNamespace`](super::SharedNamespace) to use it from several threads.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;

use super::descriptor::{Arg, Args, Call, CallBuilder, Descriptor, Getter};
use super::options::{Options, OptionsUpdate};
use super::source::Source;
use super::subscriber::{SubscriberId, UpdateHook};
use crate::error::{BoxError, Error, Result};
use crate::graph::DependencyGraph;

/// Unique identifier of a namespace instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(u64);

impl NamespaceId {
    /// Generate a new unique namespace ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NamespaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a name holds: a literal or a descriptor.
#[derive(Clone)]
pub enum Entry<V> {
    /// A literal value, returned as is.
    Value(V),
    /// A descriptor, computed on read.
    Derived(Descriptor<V>),
}

impl<V> From<Descriptor<V>> for Entry<V> {
    fn from(descriptor: Descriptor<V>) -> Self {
        Entry::Derived(descriptor)
    }
}

impl<V> From<CallBuilder<V>> for Entry<V> {
    fn from(builder: CallBuilder<V>) -> Self {
        Entry::Derived(builder.build())
    }
}

impl<V> From<Getter> for Entry<V> {
    fn from(getter: Getter) -> Self {
        Entry::Derived(Descriptor::Getter(getter))
    }
}

impl<V: fmt::Debug> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Entry::Derived(descriptor) => f.debug_tuple("Derived").field(descriptor).finish(),
        }
    }
}

/// Stored form of an [`Entry`]. Descriptors are shared so a read can hold
/// one while the namespace is borrowed mutably.
enum Stored<V> {
    Value(V),
    Derived(Arc<Descriptor<V>>),
}

/// A hook registration held on behalf of one name.
struct Subscription<V> {
    id: SubscriberId,
    source: Arc<dyn Source<V>>,
}

/// A mutable namespace of literal and derived values.
///
/// # Example
///
/// ```rust
/// use reflex_core::Namespace;
///
/// let mut ns: Namespace<i64> = Namespace::new();
/// ns.set("a", 2).unwrap();
/// ns.set("b", 5).unwrap();
/// let c = ns
///     .call(|args| Ok(args.at(0)? * args.at(1)?))
///     .arg_name("a")
///     .arg_name("b")
///     .build();
/// ns.define("c", c).unwrap();
/// assert_eq!(ns.get("c").unwrap(), 10);
///
/// ns.set("a", 3).unwrap();
/// assert_eq!(ns.get("c").unwrap(), 15);
/// ```
pub struct Namespace<V> {
    id: NamespaceId,
    options: Options,

    /// Entries in insertion order.
    values: IndexMap<String, Stored<V>>,

    /// Last computed value of derived names. Presence means fresh.
    cache: HashMap<String, V>,

    graph: DependencyGraph,

    /// Names holding a source, with the hook registered for them.
    subscriptions: HashMap<String, Subscription<V>>,

    /// Names whose source reported a change since the last operation.
    /// Shared with the hooks, which may run on other threads.
    pending: Arc<Mutex<IndexSet<String>>>,

    /// Current nesting of derived evaluations.
    depth: usize,
}

impl<V: Clone> Namespace<V> {
    /// Create an empty namespace with default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Create an empty namespace.
    pub fn with_options(options: Options) -> Self {
        Self {
            id: NamespaceId::new(),
            options,
            values: IndexMap::new(),
            cache: HashMap::new(),
            graph: DependencyGraph::new(),
            subscriptions: HashMap::new(),
            pending: Arc::new(Mutex::new(IndexSet::new())),
            depth: 0,
        }
    }

    /// This namespace's identity, carried by its getters.
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Current options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Change options. Stored values, cache and edges are kept.
    pub fn set_options(&mut self, update: OptionsUpdate) {
        self.options.apply(update);
        self.trace("set options", "");
    }

    /// Start building a call. The result is unregistered until assigned
    /// with [`define`](Self::define).
    pub fn call<F>(&self, function: F) -> CallBuilder<V>
    where
        F: Fn(&Args<V>) -> Result<V, BoxError> + Send + Sync + 'static,
    {
        self.trace("call", "");
        CallBuilder::new(function)
    }

    /// A getter reading `name` from this namespace.
    pub fn getter(&self, name: impl Into<String>) -> Getter {
        Getter::new(self.id, name)
    }

    /// Read `name`, computing it if needed.
    pub fn get(&mut self, name: &str) -> Result<V> {
        let changed = self.drain_sources();
        let value = self.read(name).map(|value| *value);
        let synced = self.propagate(&changed);
        value.and_then(|value| synced.map(|()| value))
    }

    /// Read `name`, or return `default` if it or anything it reads is
    /// undefined. Other errors still propagate.
    pub fn get_or(&mut self, name: &str, default: V) -> Result<V> {
        match self.get(name) {
            Err(err) if err.is_not_found() => Ok(default),
            result => result,
        }
    }

    /// Store a literal value.
    pub fn set(&mut self, name: impl Into<String>, value: V) -> Result<()> {
        self.set_entry(name, Entry::Value(value))
    }

    /// Store a descriptor.
    pub fn define(&mut self, name: impl Into<String>, descriptor: impl Into<Descriptor<V>>) -> Result<()> {
        self.set_entry(name, Entry::Derived(descriptor.into()))
    }

    /// Store a literal or a descriptor.
    ///
    /// Everything computed from the old entry is invalidated first. Name
    /// references in a call are bound to this namespace. In eager mode the
    /// downstream names are recomputed before this returns, and their
    /// errors are returned here; the new entry stays stored regardless.
    pub fn set_entry(&mut self, name: impl Into<String>, entry: Entry<V>) -> Result<()> {
        let name = name.into();
        let changed = self.drain_sources();
        let result = self.store(name, entry);
        let synced = self.propagate(&changed);
        result.and(synced)
    }

    fn store(&mut self, name: String, entry: Entry<V>) -> Result<()> {
        self.trace("set", &name);

        self.unsubscribe(&name);
        let stored = match entry {
            Entry::Value(value) => Stored::Value(value),
            Entry::Derived(mut descriptor) => {
                descriptor.register(self.id);
                if let Descriptor::Source(source) = &descriptor {
                    self.subscribe(&name, Arc::clone(source));
                }
                Stored::Derived(Arc::new(descriptor))
            }
        };
        self.values.insert(name.clone(), stored);

        self.recalculate(&name)
    }

    /// Assign several entries in order.
    pub fn update<I, S>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, Entry<V>)>,
        S: Into<String>,
    {
        for (name, entry) in entries {
            self.set_entry(name, entry)?;
        }
        Ok(())
    }

    /// Remove `name`, invalidating everything computed from it.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let changed = self.drain_sources();
        let result = self.remove(name);
        let synced = self.propagate(&changed);
        result.and(synced)
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        self.trace("delete", name);
        if !self.values.contains_key(name) {
            return Err(Error::not_found(name));
        }

        self.unsubscribe(name);
        self.invalidate_cache_depends(name);
        self.values.shift_remove(name);
        Ok(())
    }

    /// True if `name` holds an entry.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Snapshot of the defined names, in insertion order.
    pub fn list_names(&self) -> Vec<String> {
        self.trace("list names", "");
        self.values.keys().cloned().collect()
    }

    /// Number of defined names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no name is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The stored entry for `name`, without computing it.
    pub fn entry(&self, name: &str) -> Option<Entry<V>> {
        self.values.get(name).map(|stored| match stored {
            Stored::Value(value) => Entry::Value(value.clone()),
            Stored::Derived(descriptor) => Entry::Derived((**descriptor).clone()),
        })
    }

    /// Read every defined name.
    pub fn items(&mut self) -> Result<Vec<(String, V)>> {
        let names = self.list_names();
        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let value = self.get(&name)?;
            items.push((name, value));
        }
        Ok(items)
    }

    /// Compute a descriptor against this namespace without storing it.
    ///
    /// Fails with [`Error::Unregistered`] for a call that was never assigned
    /// to a name.
    pub fn evaluate(&mut self, descriptor: &Descriptor<V>) -> Result<V> {
        let changed = self.drain_sources();
        let value = self
            .owned_dependencies(descriptor)
            .and_then(|_| self.compute(descriptor))
            .map(|value| *value);
        let synced = self.propagate(&changed);
        value.and_then(|value| synced.map(|()| value))
    }

    /// True if `name` has a fresh cached value.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Names read by the last computation of `name`, if it is current.
    pub fn dependencies(&self, name: &str) -> Option<&HashSet<String>> {
        self.graph.dependencies(name)
    }

    /// Names whose last computation read `name`.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.graph.dependents(name).map(str::to_string).collect()
    }

    /// The dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.trace("clear", "");
        for (_, subscription) in self.subscriptions.drain() {
            subscription.source.unregister_update_hook(subscription.id);
        }
        self.pending.lock().clear();
        self.values.clear();
        self.clear_cache();
    }

    /// Drop every cached value and dependency edge.
    pub fn clear_cache(&mut self) {
        self.trace("clear cache", "");
        self.cache.clear();
        self.graph.clear();
    }

    /// Recalculate every name whose source reported a change.
    ///
    /// This also happens during `get`, `set`, `delete` and `evaluate`.
    /// Returns the number of names processed.
    pub fn poll_sources(&mut self) -> Result<usize> {
        let changed = self.drain_sources();
        self.propagate(&changed)?;
        Ok(changed.len())
    }

    // Values travel boxed between nested evaluations so the stack used per
    // level does not grow with the size of `V`.
    fn read(&mut self, name: &str) -> Result<Box<V>> {
        self.trace("get", name);
        if self.options.use_cache {
            if let Some(value) = self.cache.get(name) {
                return Ok(Box::new(value.clone()));
            }
        }

        let descriptor = match self.values.get(name) {
            None => return Err(Error::not_found(name)),
            Some(Stored::Value(value)) => return Ok(Box::new(value.clone())),
            Some(Stored::Derived(descriptor)) => Arc::clone(descriptor),
        };

        let dependencies = self.owned_dependencies(&descriptor)?;
        let value = {
            let mut level = Level::enter(self, name)?;
            level.compute(&descriptor)?
        };

        self.update_cache(name, &value);
        self.update_dependencies(name, dependencies);
        Ok(value)
    }

    fn compute(&mut self, descriptor: &Descriptor<V>) -> Result<Box<V>> {
        match descriptor {
            Descriptor::Getter(getter) => self.read_getter(getter),
            Descriptor::Call(call) => self.invoke(call),
            Descriptor::Source(source) => source
                .compute()
                .map(Box::new)
                .map_err(Error::from_user),
        }
    }

    fn invoke(&mut self, call: &Call<V>) -> Result<Box<V>> {
        if !call.is_registered() {
            return Err(Error::Unregistered);
        }

        let mut positional = Vec::with_capacity(call.positional().len());
        for arg in call.positional() {
            positional.push(*self.resolve(arg)?);
        }
        let mut keyword = IndexMap::with_capacity(call.keyword().len());
        for (key, arg) in call.keyword() {
            keyword.insert(key.clone(), *self.resolve(arg)?);
        }
        let mut extra = IndexMap::with_capacity(call.extra().len());
        for (key, arg) in call.extra() {
            extra.insert(key.clone(), *self.resolve(arg)?);
        }

        call.invoke(&call.bind(positional, keyword, extra))
            .map(Box::new)
    }

    fn resolve(&mut self, arg: &Arg<V>) -> Result<Box<V>> {
        match arg {
            Arg::Value(value) => Ok(Box::new(value.clone())),
            Arg::Name(_) => Err(Error::Unregistered),
            Arg::Getter(getter) => self.read_getter(getter),
            Arg::Call(call) => self.invoke(call),
        }
    }

    fn read_getter(&mut self, getter: &Getter) -> Result<Box<V>> {
        self.check_owner(getter)?;
        self.read(getter.name())
    }

    fn check_owner(&self, getter: &Getter) -> Result<()> {
        if getter.owner() == self.id {
            Ok(())
        } else {
            Err(Error::CrossNamespaceDependency {
                name: getter.name().to_string(),
                owner: getter.owner(),
                expected: self.id,
            })
        }
    }

    /// Names a descriptor reads, all of which must belong to this namespace.
    fn owned_dependencies(&self, descriptor: &Descriptor<V>) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        for getter in descriptor.dependencies()? {
            self.check_owner(&getter)?;
            names.insert(getter.name().to_string());
        }
        Ok(names)
    }

    fn update_cache(&mut self, name: &str, value: &V) {
        self.trace("update cache", name);
        if self.options.use_cache {
            self.cache.insert(name.to_string(), value.clone());
        }
    }

    fn update_dependencies(&mut self, name: &str, dependencies: HashSet<String>) {
        self.trace("update depends", name);
        self.graph.set_dependencies(name, Some(dependencies));
    }

    fn invalidate_cache_depends(&mut self, name: &str) {
        self.trace("invalidate cache depends", name);
        self.invalidate_cache(name);
        self.graph.set_dependencies(name, None);
    }

    fn invalidate_cache(&mut self, name: &str) {
        for stale in self.graph.downstream(name) {
            self.trace("invalidate cache", &stale);
            self.cache.remove(&stale);
        }
    }

    fn recalculate(&mut self, name: &str) -> Result<()> {
        self.trace("recalculate", name);
        self.invalidate_cache_depends(name);
        if self.options.lazy_eval {
            return Ok(());
        }
        self.calculate_outer_branches(name)
    }

    fn calculate_outer_branches(&mut self, name: &str) -> Result<()> {
        self.trace("calculate outer branches", name);
        for outer in self.graph.outer_branches(name) {
            self.read(&outer)?;
        }
        Ok(())
    }

    /// Invalidate every name whose source reported a change, in the order
    /// the changes arrived, and return those names.
    fn drain_sources(&mut self) -> Vec<String> {
        let changed: Vec<String> = self.pending.lock().drain(..).collect();
        for name in &changed {
            self.trace("source changed", name);
            self.invalidate_cache_depends(name);
        }
        changed
    }

    /// Eager half of a source change, run after the caller's own operation
    /// so a failure here never undoes it. Every name is attempted and the
    /// first error is returned.
    fn propagate(&mut self, changed: &[String]) -> Result<()> {
        if self.options.lazy_eval {
            return Ok(());
        }
        let mut first_error = None;
        for name in changed {
            if !self.values.contains_key(name) {
                continue;
            }
            if let Err(err) = self.calculate_outer_branches(name) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn subscribe(&mut self, name: &str, source: Arc<dyn Source<V>>) {
        let id = SubscriberId::new();
        let pending = Arc::downgrade(&self.pending);
        let key = name.to_string();
        let hook: UpdateHook = Arc::new(move || {
            if let Some(pending) = pending.upgrade() {
                pending.lock().insert(key.clone());
            }
        });
        source.register_update_hook(id, hook);
        self.subscriptions
            .insert(name.to_string(), Subscription { id, source });
    }

    fn unsubscribe(&mut self, name: &str) {
        if let Some(subscription) = self.subscriptions.remove(name) {
            subscription.source.unregister_update_hook(subscription.id);
            self.pending.lock().shift_remove(name);
        }
    }

    fn trace(&self, op: &str, name: &str) {
        if self.options.verbose {
            tracing::debug!(namespace = %self.id, name, "{}", op);
        }
    }
}

/// One level of nested evaluation. Dropping it leaves the level, also when
/// a user function unwinds through it.
struct Level<'a, V: Clone> {
    namespace: &'a mut Namespace<V>,
}

impl<'a, V: Clone> Level<'a, V> {
    fn enter(namespace: &'a mut Namespace<V>, name: &str) -> Result<Self> {
        let limit = namespace.options.recursion_limit;
        if namespace.depth >= limit {
            return Err(Error::RecursionLimit {
                name: name.to_string(),
                limit,
            });
        }
        namespace.depth += 1;
        Ok(Self { namespace })
    }
}

impl<V: Clone> Deref for Level<'_, V> {
    type Target = Namespace<V>;

    fn deref(&self) -> &Self::Target {
        self.namespace
    }
}

impl<V: Clone> DerefMut for Level<'_, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.namespace
    }
}

impl<V: Clone> Drop for Level<'_, V> {
    fn drop(&mut self) {
        self.namespace.depth -= 1;
    }
}

impl<V: Clone> Default for Namespace<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for Namespace<V> {
    fn drop(&mut self) {
        for (_, subscription) in self.subscriptions.drain() {
            subscription.source.unregister_update_hook(subscription.id);
        }
    }
}

impl<V> fmt::Debug for Namespace<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.len())
            .field("graph_nodes", &self.graph.node_count())
            .finish()
    }
}
