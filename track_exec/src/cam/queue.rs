//! # Frame handoff queue
//!
//! Blocking queue between two pipeline stages with two modes:
//!
//! - process-all: every item is kept, up to a safety cap beyond which the oldest is dropped.
//! - process-latest: a single slot, a new item replaces any item not yet taken.
//!
//! The mode can be switched at any time from any thread.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Condvar, Mutex, MutexGuard,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct FrameQueue<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
    latest_only: AtomicBool,
    cap: usize,

    /// Number of items discarded without being taken
    dropped: AtomicU64,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T> FrameQueue<T> {
    pub fn new(latest_only: bool, cap: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            cond: Condvar::new(),
            latest_only: AtomicBool::new(latest_only),
            cap: cap.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Add an item to the queue, waking the consumer.
    ///
    /// Items pushed after the queue is closed are discarded.
    pub fn push(&self, item: T) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }

        let dropped = if self.latest_only.load(Ordering::Relaxed) {
            let n = inner.items.len();
            inner.items.clear();
            n
        } else if inner.items.len() >= self.cap {
            inner.items.pop_front();
            warn!("Frame queue full ({} frames), dropping the oldest", self.cap);
            1
        } else {
            0
        };

        inner.items.push_back(item);
        drop(inner);

        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.cond.notify_one();
    }

    /// Take the oldest item, blocking until one is available.
    ///
    /// Returns `None` once the queue is closed.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            inner = match self.cond.wait(inner) {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
        }
    }

    /// Switch between process-latest (`true`) and process-all (`false`).
    ///
    /// Switching to process-latest immediately discards all but the newest pending item.
    pub fn set_latest_only(&self, latest_only: bool) {
        let mut inner = self.lock();
        self.latest_only.store(latest_only, Ordering::Relaxed);

        if latest_only {
            let mut n = 0;
            while inner.items.len() > 1 {
                inner.items.pop_front();
                n += 1;
            }
            self.dropped.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn is_latest_only(&self) -> bool {
        self.latest_only.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue, discarding anything pending and waking all waiting consumers.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        let n = inner.items.len() as u64;
        inner.items.clear();
        drop(inner);

        self.dropped.fetch_add(n, Ordering::Relaxed);
        self.cond.notify_all();
    }

    fn lock(&self) -> MutexGuard<Inner<T>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_burst() {
        let q = FrameQueue::new(true, 8);
        for i in 1..=10 {
            q.push(i);
        }
        assert_eq!(q.len(), 1);
        assert_eq!(q.dropped(), 9);
        assert_eq!(q.pop(), Some(10));
    }

    #[test]
    fn test_all_with_cap() {
        let q = FrameQueue::new(false, 4);
        for i in 1..=6 {
            q.push(i);
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), Some(4));
    }

    #[test]
    fn test_mode_switch() {
        let q = FrameQueue::new(false, 16);
        for i in 1..=5 {
            q.push(i);
        }
        assert!(!q.is_latest_only());

        q.set_latest_only(true);
        assert!(q.is_latest_only());
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(5));

        q.set_latest_only(false);
        q.push(6);
        q.push(7);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_close_wakes_consumer() {
        let q = Arc::new(FrameQueue::<u32>::new(true, 1));
        let qc = q.clone();

        let consumer = thread::spawn(move || qc.pop());
        q.close();

        assert_eq!(consumer.join().unwrap(), None);

        // Pushes after closing are ignored
        q.push(1);
        assert!(q.is_empty());
    }

    #[test]
    fn test_handoff_between_threads() {
        let q = Arc::new(FrameQueue::new(false, 1000));
        let qp = q.clone();

        let producer = thread::spawn(move || {
            for i in 0..100u32 {
                qp.push(i);
            }
        });

        let mut got = Vec::new();
        while got.len() < 100 {
            if let Some(i) = q.pop() {
                got.push(i);
            }
        }
        producer.join().unwrap();

        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }
}
