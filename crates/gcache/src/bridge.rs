//! Sync-to-async bridge.
//!
//! `register_sync` callers live on plain OS threads with no `Runtime` of
//! their own. The bridge gives them one: a fixed pool of worker threads,
//! each pinned to a dedicated single-threaded `tokio::runtime::Runtime`,
//! that a blocking caller can hand a future to and wait on. The caller's
//! enable-scope is carried across the thread boundary by re-entering
//! [`scope::with_scope`] inside the worker before the future runs.
//!
//! A worker thread running a dispatched job is, for the duration of that
//! job, itself inside this crate's call stack. If the job's future calls
//! back into `submit_sync` (a cached sync function calling another cached
//! sync function), blocking on `rx.recv()` would deadlock the worker
//! against itself. `IN_BRIDGE_DISPATCH` flags exactly that thread for
//! exactly that duration so the nested call fails fast instead.

use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use gcache_core::{CacheError, Result};

use crate::scope;

thread_local! {
    static IN_BRIDGE_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

type Job = Box<dyn FnOnce(&tokio::runtime::Runtime) + Send>;

#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    pub pool_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { pool_size: 4 }
    }
}

struct Worker {
    sender: mpsc::Sender<Job>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(index: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = std::thread::Builder::new()
            .name(format!("gcache-bridge-{index}"))
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build bridge worker runtime");
                for job in receiver {
                    IN_BRIDGE_DISPATCH.with(|f| f.set(true));
                    job(&rt);
                    IN_BRIDGE_DISPATCH.with(|f| f.set(false));
                }
            })
            .expect("failed to spawn bridge worker thread");
        Self {
            sender,
            handle: Some(handle),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Dropping `sender` (implicit, as part of `self`) closes the
        // channel, which ends the worker's `for job in receiver` loop.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Owns the fixed worker pool backing `register_sync`.
pub struct Bridge {
    workers: Vec<Worker>,
    next: AtomicUsize,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        let workers = (0..pool_size).map(Worker::spawn).collect();
        Self {
            workers,
            next: AtomicUsize::new(0),
        }
    }

    fn pick_worker(&self) -> &Worker {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[i]
    }

    /// Runs `fut_fn` to completion on a bridge worker, with the enable-scope
    /// set to `scope_state` for its duration, and blocks the calling thread
    /// for the result. `scope_state` is carried across exactly as observed
    /// at the call site: a caller outside any `enable` scope reproduces
    /// `ScopeState::NoScope` on the worker rather than being collapsed into
    /// an explicit disable. Returns [`CacheError::ReentrantSyncCall`]
    /// without dispatching anything if called from inside an
    /// already-dispatched job on the same worker thread.
    pub fn submit_sync<F, Fut, T>(&self, scope_state: scope::ScopeState, fut_fn: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
        T: Send + 'static,
    {
        if IN_BRIDGE_DISPATCH.with(|f| f.get()) {
            return Err(CacheError::ReentrantSyncCall);
        }

        let (tx, rx) = mpsc::channel::<Result<T>>();
        let job: Job = Box::new(move |rt: &tokio::runtime::Runtime| {
            let result = rt.block_on(scope::with_state(scope_state, fut_fn()));
            let _ = tx.send(result);
        });

        self.pick_worker()
            .sender
            .send(job)
            .map_err(|_| CacheError::Transport("bridge worker channel closed".into()))?;

        rx.recv()
            .map_err(|_| CacheError::Transport("bridge worker dropped its response channel".into()))?
    }
}
