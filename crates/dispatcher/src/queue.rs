//! Per-sink bounded delivery queue with drop-oldest overflow.
//!
//! An mpsc channel can only refuse the newest item when full; under a
//! sustained downstream outage the freshest events are exactly the ones
//! worth keeping. This queue evicts the head instead, so the producer
//! never blocks and never loses the newest event.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Enqueued with room to spare
    Enqueued,
    /// Enqueued, but the oldest queued item was evicted to make room
    DroppedOldest,
    /// Queue closed, item discarded
    Closed,
}

/// Bounded FIFO shared between one producer and one worker.
#[derive(Debug)]
pub struct DeliveryQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Push without blocking, evicting the oldest item when full.
    pub fn push(&self, item: T) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }

        let outcome = {
            let mut queue = self.lock();
            let outcome = if queue.len() == self.capacity {
                queue.pop_front();
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Enqueued
            };
            queue.push_back(item);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Pop the head, waiting while the queue is open and empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // Register for a wakeup before re-checking, so a push between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut queue = self.lock();
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Close the queue; the worker drains what remains, producers discard.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
