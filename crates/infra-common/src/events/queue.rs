//! Closeable blocking FIFO used between protocol client threads and the gateway.
//!
//! Producers live on the client side (one or more internal threads per client),
//! the primary consumer is the gateway dispatch loop. The queue is the only
//! structure shared across those threads.
//!
//! Closing is idempotent and never deadlocks: every consumer blocked in
//! [`EventQueue::pop`] wakes up and, once the items pushed before the close are
//! drained, receives the closed sentinel (`None`).

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::types::Error;

/// Returned by [`EventQueue::push`] when the queue has been closed.
/// Carries the rejected item back to the producer.
#[derive(Clone, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    /// Take back the item that could not be queued
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueClosed(..)")
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("event queue is closed")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

impl<T> From<QueueClosed<T>> for Error {
    fn from(_: QueueClosed<T>) -> Self {
        Error::QueueClosed
    }
}

/// Outcome of a non-blocking or time-limited receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv<T> {
    /// An item was dequeued
    Item(T),
    /// Nothing arrived (immediately, or within the wait)
    Empty,
    /// The queue is closed and fully drained
    Closed,
}

impl<T> Recv<T> {
    /// Convert into the item, discarding the empty/closed distinction
    pub fn item(self) -> Option<T> {
        match self {
            Recv::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Recv::Closed)
    }
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

/// Thread-safe multi-producer FIFO with a distinguished closed state.
///
/// Cloning yields another handle to the same queue.
pub struct EventQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("EventQueue")
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> EventQueue<T> {
    /// Queue that never blocks producers
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue holding at most `capacity` items; `push` blocks while full.
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Append an item. Fails only when the queue is closed; on a full bounded
    /// queue the producer waits for space (or for the close).
    pub fn push(&self, item: T) -> Result<(), QueueClosed<T>> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(QueueClosed(item));
            }
            match self.inner.capacity {
                Some(cap) if state.items.len() >= cap => {
                    self.inner.not_full.wait(&mut state);
                }
                _ => break,
            }
        }
        state.items.push_back(item);
        drop(state);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Block until an item is available. `None` is the closed sentinel.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.inner.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.inner.not_empty.wait(&mut state);
        }
    }

    /// Dequeue without blocking
    pub fn try_pop(&self) -> Recv<T> {
        let mut state = self.inner.state.lock();
        match state.items.pop_front() {
            Some(item) => {
                drop(state);
                self.inner.not_full.notify_one();
                Recv::Item(item)
            }
            None if state.closed => Recv::Closed,
            None => Recv::Empty,
        }
    }

    /// Block for at most `timeout` waiting for an item
    pub fn pop_timeout(&self, timeout: Duration) -> Recv<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.inner.not_full.notify_one();
                return Recv::Item(item);
            }
            if state.closed {
                return Recv::Closed;
            }
            if self
                .inner
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // One last look: an item or a close may have raced the timeout
                return match state.items.pop_front() {
                    Some(item) => {
                        drop(state);
                        self.inner.not_full.notify_one();
                        Recv::Item(item)
                    }
                    None if state.closed => Recv::Closed,
                    None => Recv::Empty,
                };
            }
        }
    }

    /// Close the queue. Idempotent. Wakes every blocked consumer and producer.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::unbounded();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        let drained: Vec<i32> = (0..5).filter_map(|_| queue.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_push_after_close_returns_item() {
        let queue = EventQueue::unbounded();
        queue.close();
        let err = queue.push("late").unwrap_err();
        assert_eq!(err.into_inner(), "late");
    }

    #[test]
    fn test_close_is_idempotent() {
        let queue: EventQueue<u8> = EventQueue::unbounded();
        queue.close();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_items_before_close_are_drained() {
        let queue = EventQueue::unbounded();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.close();
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.try_pop(), Recv::Item(2));
        assert_eq!(queue.try_pop(), Recv::Closed);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_try_pop_empty() {
        let queue: EventQueue<u8> = EventQueue::unbounded();
        assert_eq!(queue.try_pop(), Recv::Empty);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_timeout_expires() {
        let queue: EventQueue<u8> = EventQueue::unbounded();
        let start = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)), Recv::Empty);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_pop_timeout_receives_item() {
        let queue = EventQueue::unbounded();
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(42u32).unwrap();
        });
        assert_eq!(queue.pop_timeout(Duration::from_secs(5)), Recv::Item(42));
        handle.join().unwrap();
    }

    #[test]
    fn test_bounded_push_waits_for_space() {
        let queue = EventQueue::bounded(1);
        queue.push(1u8).unwrap();
        let producer = queue.clone();
        let handle = thread::spawn(move || producer.push(2u8));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(1));
        handle.join().unwrap().unwrap();
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn test_close_releases_blocked_producer() {
        let queue = EventQueue::bounded(1);
        queue.push(1u8).unwrap();
        let producer = queue.clone();
        let handle = thread::spawn(move || producer.push(2u8));
        thread::sleep(Duration::from_millis(30));
        queue.close();
        let res = handle.join().unwrap();
        assert_eq!(res.unwrap_err().into_inner(), 2);
    }
}
