//! Per-source single-writer locks.
//!
//! A parse of a source's cache file holds that source's lock for its whole
//! duration. A second attempt does not queue: it waits one short interval,
//! checks again and gives up if the lock is still taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use super::{Source, SOURCE_COUNT};

/// Default wait before the single re-check of a taken lock.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Who holds a source lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    /// Opaque token unique to one acquisition.
    pub token: u64,
    /// Thread that acquired the lock.
    pub thread: ThreadId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Unlocked,
    Locked(LockHolder),
}

/// Lock table with one slot per [`Source`].
#[derive(Debug)]
pub struct SourceLocks {
    slots: [Mutex<LockState>; SOURCE_COUNT],
    next_token: AtomicU64,
    retry_delay: Duration,
}

impl Default for SourceLocks {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl SourceLocks {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(LockState::Unlocked)),
            next_token: AtomicU64::new(1),
            retry_delay,
        }
    }

    /// The process-wide table.
    pub fn shared() -> Arc<SourceLocks> {
        static SHARED: OnceLock<Arc<SourceLocks>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(SourceLocks::default())).clone()
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn slot(&self, source: Source) -> MutexGuard<'_, LockState> {
        // the state is a plain enum; a panic while holding the mutex cannot corrupt it
        self.slots[source.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `source` as locked by the calling thread. Returns `None` if it is taken.
    pub fn lock(&self, source: Source) -> Option<LockHolder> {
        let mut slot = self.slot(source);
        match *slot {
            LockState::Locked(_) => None,
            LockState::Unlocked => {
                let holder = LockHolder {
                    token: self.next_token.fetch_add(1, Ordering::Relaxed),
                    thread: thread::current().id(),
                };
                *slot = LockState::Locked(holder);
                Some(holder)
            }
        }
    }

    /// Releases `source` if `token` is the current holder's. Returns whether it did.
    pub fn unlock(&self, source: Source, token: u64) -> bool {
        let mut slot = self.slot(source);
        match *slot {
            LockState::Locked(holder) if holder.token == token => {
                *slot = LockState::Unlocked;
                true
            }
            _ => false,
        }
    }

    pub fn is_locked(&self, source: Source) -> bool {
        matches!(*self.slot(source), LockState::Locked(_))
    }

    pub fn holder(&self, source: Source) -> Option<LockHolder> {
        match *self.slot(source) {
            LockState::Locked(holder) => Some(holder),
            LockState::Unlocked => None,
        }
    }

    /// Takes the lock without waiting.
    pub fn try_acquire(self: &Arc<Self>, source: Source) -> Option<SourceGuard> {
        let holder = self.lock(source)?;
        tracing::trace!(source = %source, token = holder.token, "Source locked");
        Some(SourceGuard {
            locks: Arc::clone(self),
            source,
            holder,
        })
    }

    /// Takes the lock, re-checking once after the retry delay.
    pub async fn acquire(self: &Arc<Self>, source: Source) -> Option<SourceGuard> {
        if let Some(guard) = self.try_acquire(source) {
            return Some(guard);
        }
        tracing::debug!(source = %source, delay_ms = self.retry_delay.as_millis() as u64, "Source busy, retrying once");
        tokio::time::sleep(self.retry_delay).await;
        let guard = self.try_acquire(source);
        if guard.is_none() {
            tracing::info!(source = %source, "Source still busy, giving up");
        }
        guard
    }

    /// Blocking variant of [`acquire`](Self::acquire) for callers outside a runtime.
    pub fn acquire_blocking(self: &Arc<Self>, source: Source) -> Option<SourceGuard> {
        if let Some(guard) = self.try_acquire(source) {
            return Some(guard);
        }
        thread::sleep(self.retry_delay);
        self.try_acquire(source)
    }
}

/// Holds a source lock; releases it on drop, including during unwinding.
#[derive(Debug)]
pub struct SourceGuard {
    locks: Arc<SourceLocks>,
    source: Source,
    holder: LockHolder,
}

impl SourceGuard {
    pub fn source(&self) -> Source {
        self.source
    }

    pub fn holder(&self) -> LockHolder {
        self.holder
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if self.locks.unlock(self.source, self.holder.token) {
            tracing::trace!(source = %self.source, token = self.holder.token, "Source unlocked");
        }
    }
}
