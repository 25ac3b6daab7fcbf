// Realtime key-value store contract and the writes a room sends to it.
//
// A store holds one JSON tree addressed by slash-separated paths. Clients
// write values, remove values, and subscribe to a path to receive the full
// subtree whenever anything under it changes.

pub mod memory;
pub mod paths;
pub mod relay;
pub mod tree;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub use memory::MemoryStore;
pub use relay::RelayStore;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("store connection closed")]
    Disconnected,

    #[error("store rejected write to {path}: {message}")]
    Rejected { path: String, message: String },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A live view of one path. Yields the subtree immediately and then after
/// every change under it; ends when the store goes away.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Value>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Subscription { rx, on_drop: None }
    }

    /// Attach a hook that runs when the subscription is dropped.
    pub fn with_drop_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_drop = Some(Box::new(hook));
        self
    }

    /// Next snapshot, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Next snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_drop.take() {
            hook();
        }
    }
}

/// The operations a room needs from a realtime store.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Write `value` at `path`. Writing `null` removes the path.
    async fn set(&self, path: &str, value: Value) -> Result<(), SyncError>;

    /// Delete whatever is stored at `path`.
    async fn remove(&self, path: &str) -> Result<(), SyncError>;

    /// Watch the subtree at `path`.
    async fn subscribe(&self, path: &str) -> Result<Subscription, SyncError>;

    /// Ask the store to delete `path` when this client's connection ends.
    /// Stores without connection tracking ignore this.
    async fn remove_on_disconnect(&self, _path: &str) -> Result<(), SyncError> {
        Ok(())
    }
}

/// One write a local state change implies for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteWrite {
    Set { path: String, value: Value },
    Remove { path: String },
    RemoveOnDisconnect { path: String },
}

impl RemoteWrite {
    pub fn path(&self) -> &str {
        match self {
            RemoteWrite::Set { path, .. }
            | RemoteWrite::Remove { path }
            | RemoteWrite::RemoveOnDisconnect { path } => path,
        }
    }
}

/// Apply writes to the store in order, stopping at the first failure.
pub async fn apply_writes(store: &dyn SyncStore, writes: &[RemoteWrite]) -> Result<(), SyncError> {
    for write in writes {
        match write {
            RemoteWrite::Set { path, value } => store.set(path, value.clone()).await?,
            RemoteWrite::Remove { path } => store.remove(path).await?,
            RemoteWrite::RemoveOnDisconnect { path } => store.remove_on_disconnect(path).await?,
        }
    }
    Ok(())
}

/// Apply writes and swallow any failure into a warning.
///
/// Returns whether every write succeeded.
pub async fn propagate(store: Arc<dyn SyncStore>, writes: Vec<RemoteWrite>) -> bool {
    match apply_writes(store.as_ref(), &writes).await {
        Ok(()) => {
            debug!("Propagated {} write(s)", writes.len());
            true
        }
        Err(e) => {
            let first = writes.first().map(RemoteWrite::path).unwrap_or_default();
            warn!("Store write failed ({} write(s) starting at {first}), keeping local state: {e}", writes.len());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records writes and fails once `fail_after` writes have succeeded.
    struct RecordingStore {
        log: Mutex<Vec<String>>,
        fail_after: usize,
    }

    #[async_trait]
    impl SyncStore for RecordingStore {
        async fn set(&self, path: &str, _value: Value) -> Result<(), SyncError> {
            let mut log = self.log.lock().unwrap();
            if log.len() >= self.fail_after {
                return Err(SyncError::Disconnected);
            }
            log.push(format!("set {path}"));
            Ok(())
        }

        async fn remove(&self, path: &str) -> Result<(), SyncError> {
            let mut log = self.log.lock().unwrap();
            if log.len() >= self.fail_after {
                return Err(SyncError::Disconnected);
            }
            log.push(format!("remove {path}"));
            Ok(())
        }

        async fn subscribe(&self, _path: &str) -> Result<Subscription, SyncError> {
            Err(SyncError::Disconnected)
        }
    }

    fn writes() -> Vec<RemoteWrite> {
        vec![
            RemoteWrite::Set {
                path: "a".into(),
                value: json!(1),
            },
            RemoteWrite::Remove { path: "b".into() },
            RemoteWrite::RemoveOnDisconnect { path: "c".into() },
        ]
    }

    #[tokio::test]
    async fn apply_writes_in_order() {
        let store = RecordingStore {
            log: Mutex::new(Vec::new()),
            fail_after: usize::MAX,
        };
        apply_writes(&store, &writes()).await.unwrap();
        // remove_on_disconnect uses the default no-op
        assert_eq!(*store.log.lock().unwrap(), vec!["set a", "remove b"]);
    }

    #[tokio::test]
    async fn apply_writes_stops_at_first_failure() {
        let store = RecordingStore {
            log: Mutex::new(Vec::new()),
            fail_after: 1,
        };
        let err = apply_writes(&store, &writes()).await.unwrap_err();
        assert!(matches!(err, SyncError::Disconnected));
        assert_eq!(*store.log.lock().unwrap(), vec!["set a"]);
    }

    #[tokio::test]
    async fn propagate_reports_failure_without_error() {
        let store: Arc<dyn SyncStore> = Arc::new(RecordingStore {
            log: Mutex::new(Vec::new()),
            fail_after: 0,
        });
        assert!(!propagate(store, writes()).await);
    }

    #[tokio::test]
    async fn subscription_drop_hook_runs_once() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let flag = Arc::new(Mutex::new(0));
        let flag_clone = Arc::clone(&flag);
        let sub = Subscription::new(rx).with_drop_hook(move || {
            *flag_clone.lock().unwrap() += 1;
        });
        drop(sub);
        assert_eq!(*flag.lock().unwrap(), 1);
    }

    #[test]
    fn remote_write_path() {
        let w = RemoteWrite::Remove { path: "x/y".into() };
        assert_eq!(w.path(), "x/y");
    }
}
