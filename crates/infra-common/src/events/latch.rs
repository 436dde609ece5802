//! One-shot value with a bounded wait.
//!
//! Used where a component resolves something exactly once on its own thread
//! (for example "the Telegram session is authorized") and another thread
//! needs to wait for it with a deadline instead of a future.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner<T> {
    value: Mutex<Option<T>>,
    resolved: Condvar,
}

/// Settable-once latch. Clones share the same slot.
pub struct ReadyLatch<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ReadyLatch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadyLatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyLatch")
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

impl<T> Default for ReadyLatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReadyLatch<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(None),
                resolved: Condvar::new(),
            }),
        }
    }

    /// Resolve the latch. The first writer wins; returns whether this call
    /// was the one that resolved it.
    pub fn set(&self, value: T) -> bool {
        let mut slot = self.inner.value.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        drop(slot);
        self.inner.resolved.notify_all();
        true
    }
}

impl<T: Clone> ReadyLatch<T> {
    /// Current value without waiting
    pub fn peek(&self) -> Option<T> {
        self.inner.value.lock().clone()
    }

    /// Wait up to `timeout` for the latch to resolve
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.value.lock();
        while slot.is_none() {
            if self
                .inner
                .resolved
                .wait_until(&mut slot, deadline)
                .timed_out()
            {
                break;
            }
        }
        slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_writer_wins() {
        let latch = ReadyLatch::new();
        assert!(latch.set(true));
        assert!(!latch.set(false));
        assert_eq!(latch.peek(), Some(true));
    }

    #[test]
    fn test_wait_times_out() {
        let latch: ReadyLatch<bool> = ReadyLatch::new();
        let start = Instant::now();
        assert_eq!(latch.wait_timeout(Duration::from_millis(25)), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_wait_resolved_from_other_thread() {
        let latch = ReadyLatch::new();
        let setter = latch.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set(7u32);
        });
        assert_eq!(latch.wait_timeout(Duration::from_secs(5)), Some(7));
        handle.join().unwrap();
    }
}
