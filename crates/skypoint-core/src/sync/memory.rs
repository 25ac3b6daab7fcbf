// In-process realtime store.
//
// Backs demo sessions that share one process, the relay server, and tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use super::paths::segments;
use super::tree;
use super::{Subscription, SyncError, SyncStore};

struct Watcher {
    id: u64,
    path: Vec<String>,
    tx: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
struct Inner {
    root: Value,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
}

impl Inner {
    /// Push the current subtree to every watcher whose path overlaps the
    /// write, dropping watchers whose receiver is gone.
    fn notify(&mut self, written: &[&str]) {
        let root = &self.root;
        self.watchers.retain(|w| {
            let watched: Vec<&str> = w.path.iter().map(String::as_str).collect();
            if !tree::overlaps(written, &watched) {
                return !w.tx.is_closed();
            }
            w.tx.send(tree::get_or_null(root, &watched)).is_ok()
        });
    }
}

/// A JSON tree with path subscriptions, shared by cloning.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }

    /// Current value at `path` (`null` when absent).
    pub fn get(&self, path: &str) -> Value {
        tree::get_or_null(&self.inner().root, &segments(path))
    }

    /// Write synchronously and notify watchers.
    pub fn put(&self, path: &str, value: Value) {
        let segs = segments(path);
        let mut inner = self.inner();
        tree::set(&mut inner.root, &segs, value);
        inner.notify(&segs);
        trace!("store set {path}");
    }

    /// Remove synchronously and notify watchers if anything changed.
    pub fn delete(&self, path: &str) {
        let segs = segments(path);
        let mut inner = self.inner();
        if tree::remove(&mut inner.root, &segs) {
            inner.notify(&segs);
            trace!("store remove {path}");
        }
    }

    /// Start watching `path`. The current subtree is queued immediately.
    pub fn watch(&self, path: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let path: Vec<String> = segments(path).into_iter().map(str::to_string).collect();

        let mut inner = self.inner();
        let watched: Vec<&str> = path.iter().map(String::as_str).collect();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(tree::get_or_null(&inner.root, &watched));

        let id = inner.next_watcher_id;
        inner.next_watcher_id += 1;
        inner.watchers.push(Watcher { id, path, tx });
        drop(inner);

        let store = self.clone();
        Subscription::new(rx).with_drop_hook(move || store.unwatch(id))
    }

    fn unwatch(&self, id: u64) {
        // Drop hooks can run while the lock is poisoned during a panic unwind.
        if let Ok(mut inner) = self.inner.lock() {
            inner.watchers.retain(|w| w.id != id);
        }
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner().watchers.len()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), SyncError> {
        self.put(path, value);
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), SyncError> {
        self.delete(path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, SyncError> {
        Ok(self.watch(path))
    }
}
