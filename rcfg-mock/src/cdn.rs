//! In-memory CDN.

use rcfg_model::{RemoteError, TransportError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Serves files by path and counts every request.
///
/// Clones share files and counters.
#[derive(Clone, Default)]
pub struct MockCdn {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    hanging: Arc<Mutex<BTreeSet<String>>>,
    failing: Arc<Mutex<BTreeSet<String>>>,
    released: Arc<Notify>,
    requests: Arc<AtomicU64>,
}

impl MockCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `files` in addition to what is already served.
    pub fn serve(&self, files: BTreeMap<String, Vec<u8>>) {
        self.files.lock().unwrap().extend(files);
    }

    pub fn put(&self, path: &str, raw: Vec<u8>) {
        self.files.lock().unwrap().insert(path.to_string(), raw);
    }

    /// Requests for `path` wait until [`release`](Self::release).
    pub fn hang_on(&self, path: &str) {
        self.hanging.lock().unwrap().insert(path.to_string());
    }

    /// Let waiting and future requests for `path` through.
    pub fn release(&self, path: &str) {
        self.hanging.lock().unwrap().remove(path);
        self.released.notify_waiters();
    }

    /// Requests for `path` fail with a 503.
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn fetch(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if !self.hanging.lock().unwrap().contains(path) {
                break;
            }
            released.await;
        }
        if self.failing.lock().unwrap().contains(path) {
            return Err(TransportError::Status {
                status: 503,
                path: path.to_string(),
            }
            .into());
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}
