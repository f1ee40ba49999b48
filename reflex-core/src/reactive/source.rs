//! Sources
//!
//! A source is a root value that changes outside the namespace's control. It
//! computes its current value on demand and, through update hooks, tells every
//! namespace holding it when that value has moved on. The namespace then
//! treats the name as if it had been reassigned.
//!
//! Two sources ship with the crate:
//!
//! - [`InputSource`]: a value set from elsewhere in the program, such as an
//!   interactive control.
//! - [`FileSource`]: the contents of a file, polled on a background thread.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};

use super::descriptor::Getter;
use super::subscriber::{SubscriberId, UpdateHook, UpdateHooks};
use crate::error::BoxError;

/// A root value with its own change notifications.
pub trait Source<V>: Send + Sync {
    /// Produce the current value.
    fn compute(&self) -> Result<V, BoxError>;

    /// Names this source reads. Sources are roots, so this is normally empty.
    fn dependencies(&self) -> Vec<Getter> {
        Vec::new()
    }

    /// Ask to have `hook` invoked whenever the value changes.
    fn register_update_hook(&self, id: SubscriberId, hook: UpdateHook);

    /// Withdraw a hook registered under `id`.
    fn unregister_update_hook(&self, id: SubscriberId);
}

/// A value set from outside the namespace.
///
/// Clones share state, so one clone can be handed to a namespace while
/// another stays with whatever produces new values.
///
/// ```rust
/// use reflex_core::{Descriptor, InputSource, Namespace};
///
/// let slider = InputSource::new(3);
/// let mut ns: Namespace<i32> = Namespace::new();
/// ns.define("x", Descriptor::source(slider.clone())).unwrap();
/// assert_eq!(ns.get("x").unwrap(), 3);
///
/// slider.set(7);
/// assert_eq!(ns.get("x").unwrap(), 7);
/// ```
pub struct InputSource<V> {
    inner: Arc<InputInner<V>>,
}

struct InputInner<V> {
    value: RwLock<V>,
    hooks: UpdateHooks,
}

impl<V> InputSource<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a source holding `value`.
    pub fn new(value: V) -> Self {
        Self {
            inner: Arc::new(InputInner {
                value: RwLock::new(value),
                hooks: UpdateHooks::new(),
            }),
        }
    }

    /// Current value.
    pub fn value(&self) -> V {
        self.inner.value.read().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: V) {
        *self.inner.value.write() = value;
        self.inner.hooks.trigger();
    }

    /// Number of namespaces subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.hooks.len()
    }
}

impl<V> Clone for InputSource<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Source<V> for InputSource<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn compute(&self) -> Result<V, BoxError> {
        Ok(self.value())
    }

    fn register_update_hook(&self, id: SubscriberId, hook: UpdateHook) {
        self.inner.hooks.register(id, hook);
    }

    fn unregister_update_hook(&self, id: SubscriberId) {
        self.inner.hooks.unregister(id);
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for InputSource<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("value", &*self.inner.value.read())
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}

/// Contents of a file, reloaded when its modification time or length changes.
///
/// A background thread polls the file every `interval`. The thread stops once
/// the last clone of the source is dropped.
pub struct FileSource {
    inner: Arc<FileInner>,
    _guard: Arc<WatchGuard>,
}

struct FileInner {
    path: PathBuf,
    contents: RwLock<Vec<u8>>,
    stamp: Mutex<Option<(SystemTime, u64)>>,
    hooks: UpdateHooks,
    alive: AtomicBool,
}

/// Flips the poll thread off when the last handle goes away.
struct WatchGuard(Arc<FileInner>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.0.alive.store(false, Ordering::SeqCst);
    }
}

impl FileSource {
    /// Read `path` now and start polling it every `interval`.
    pub fn watch(path: impl AsRef<Path>, interval: Duration) -> io::Result<Self> {
        let inner = Arc::new(FileInner {
            path: path.as_ref().to_path_buf(),
            contents: RwLock::new(Vec::new()),
            stamp: Mutex::new(None),
            hooks: UpdateHooks::new(),
            alive: AtomicBool::new(true),
        });
        inner.poll()?;

        let worker = Arc::clone(&inner);
        thread::Builder::new()
            .name(format!("reflex-watch:{}", inner.path.display()))
            .spawn(move || {
                while worker.alive.load(Ordering::SeqCst) {
                    thread::sleep(interval);
                    if !worker.alive.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(err) = worker.poll() {
                        tracing::warn!(path = %worker.path.display(), error = %err, "file poll failed");
                    }
                }
            })?;

        Ok(Self {
            _guard: Arc::new(WatchGuard(Arc::clone(&inner))),
            inner,
        })
    }

    /// Poll the file once. Returns true if the contents were reloaded.
    pub fn refresh(&self) -> io::Result<bool> {
        self.inner.poll()
    }

    /// Watched path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Last loaded contents.
    pub fn contents(&self) -> Vec<u8> {
        self.inner.contents.read().clone()
    }
}

impl FileInner {
    fn poll(&self) -> io::Result<bool> {
        let metadata = fs::metadata(&self.path)?;
        let stamp = (metadata.modified()?, metadata.len());

        {
            let mut current = self.stamp.lock();
            if *current == Some(stamp) {
                return Ok(false);
            }
            *self.contents.write() = fs::read(&self.path)?;
            *current = Some(stamp);
        }

        self.hooks.trigger();
        Ok(true)
    }
}

impl Clone for FileSource {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _guard: Arc::clone(&self._guard),
        }
    }
}

impl<V> Source<V> for FileSource
where
    V: From<Vec<u8>>,
{
    fn compute(&self) -> Result<V, BoxError> {
        Ok(V::from(self.contents()))
    }

    fn register_update_hook(&self, id: SubscriberId, hook: UpdateHook) {
        self.inner.hooks.register(id, hook);
    }

    fn unregister_update_hook(&self, id: SubscriberId) {
        self.inner.hooks.unregister(id);
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.inner.path)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}
