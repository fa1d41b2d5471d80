//! Process-wide singleton enforcement for the facade.

use std::sync::atomic::{AtomicBool, Ordering};

use gcache_core::{CacheError, Result};

static LIVE: AtomicBool = AtomicBool::new(false);

/// Held for the lifetime of a constructed facade. Dropping it (facade
/// teardown) frees the slot for a later construction.
pub struct SingletonGuard(());

impl SingletonGuard {
    pub fn acquire() -> Result<Self> {
        LIVE.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| SingletonGuard(()))
            .map_err(|_| CacheError::SingletonViolation)
    }
}

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        LIVE.store(false, Ordering::SeqCst);
    }
}
