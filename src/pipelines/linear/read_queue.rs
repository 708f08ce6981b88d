//! Bounded read queue between the producer and the processor threads.
//!
//! One interface, two backends chosen at runtime:
//!
//! - [`BlockingReadQueue`]: mutex plus two condition variables. `push` blocks
//!   while the queue is full, `pop` blocks while it is empty and returns `None`
//!   only once `done_pushing` is set and every item has been consumed. Strict
//!   FIFO, exact capacity.
//! - [`LockFreeReadQueue`]: a bounded lock-free ring (`crossbeam_queue`).
//!   Neither operation blocks. A rejected push hands the item back for retry;
//!   an empty pop returns `None` and the caller decides whether the stream has
//!   ended by checking `done_pushing` (see [`next_item`]).
//!
//! # Counter protocol
//!
//! `num_in` is incremented with `Release` after the element is inserted and
//! `num_out` with `Release` after it is removed; both are read with `Acquire`.
//! A thread that observes `num_in == k` therefore also observes the k inserts
//! that precede it. `done_pushing` is stored with `Release` after the last push
//! returns and loaded with `Acquire`, so a consumer that sees the flag set and
//! then finds the queue empty has seen every element that will ever arrive.
//! Under the blocking backend both counters only change while the lock is held
//! and `resident()` is read under the same lock, so `num_in - num_out` is exact.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};

use crate::core::diagnostics::DiagnosticSink;
use crate::defaults;
use crate::pipelines::linear::filter_opt::QueueBackend;

/// Minimum backoff duration in microseconds.
pub const MIN_BACKOFF_US: u64 = 10;
/// Maximum backoff duration in microseconds (1ms).
pub const MAX_BACKOFF_US: u64 = 1000;

/// Queue construction parameters.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub id: String,
    pub capacity: usize,
    /// Expected number of items, for progress messages only
    pub expected_total: u64,
    /// Emit a progress message every this many successful pops (0 disables)
    pub progress_interval: u64,
}

impl QueueConfig {
    pub fn new(id: impl Into<String>, capacity: usize, expected_total: u64) -> Self {
        Self {
            id: id.into(),
            capacity: capacity.max(1),
            expected_total,
            progress_interval: defaults::PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Concurrent queue contract shared by both backends.
pub trait ReadQueue<T>: Send + Sync {
    fn id(&self) -> &str;

    fn capacity(&self) -> usize;

    /// Insert an item. `Err` hands the item back: the queue rejected it and the
    /// caller should retry. The blocking backend never rejects.
    fn push(&self, item: T) -> Result<(), T>;

    /// Remove an item. The blocking backend waits and returns `None` only at
    /// end of stream; the lock-free backend returns `None` whenever it is empty.
    fn pop(&self) -> Option<T>;

    /// Signal that no further items will be pushed.
    fn mark_done_pushing(&self);

    fn is_done_pushing(&self) -> bool;

    fn num_in(&self) -> u64;

    fn num_out(&self) -> u64;

    /// Items currently buffered (`num_in - num_out`).
    fn resident(&self) -> u64 {
        let out = self.num_out();
        self.num_in().saturating_sub(out)
    }

    /// True when `pop` itself reports end of stream.
    fn pop_signals_end(&self) -> bool;
}

/// Build a queue for the configured backend.
pub fn new_read_queue<T: Send + 'static>(
    backend: QueueBackend,
    config: QueueConfig,
    sink: Arc<dyn DiagnosticSink>,
) -> Arc<dyn ReadQueue<T>> {
    match backend {
        QueueBackend::Blocking => Arc::new(BlockingReadQueue::new(config, sink)),
        QueueBackend::LockFree => Arc::new(LockFreeReadQueue::new(config, sink)),
    }
}

/// Progress notification shared by both backends.
struct Progress {
    id: String,
    expected_total: u64,
    interval: u64,
    sink: Arc<dyn DiagnosticSink>,
}

impl Progress {
    fn on_pop(&self, popped: u64) {
        if self.interval > 0 && popped % self.interval == 0 {
            if self.expected_total > 0 {
                self.sink.info(&format!(
                    "{}: popped {} of {} reads",
                    self.id, popped, self.expected_total
                ));
            } else {
                self.sink.info(&format!("{}: popped {} reads", self.id, popped));
            }
        }
    }
}

// ============================================================================
// BLOCKING BACKEND
// ============================================================================

pub struct BlockingReadQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    done_pushing: AtomicBool,
    num_in: AtomicU64,
    num_out: AtomicU64,
    progress: Progress,
}

impl<T> BlockingReadQueue<T> {
    pub fn new(config: QueueConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        sink.debug(&format!(
            "created blocking read queue '{}' with capacity {}",
            config.id, config.capacity
        ));
        Self {
            capacity: config.capacity,
            items: Mutex::new(VecDeque::with_capacity(config.capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            done_pushing: AtomicBool::new(false),
            num_in: AtomicU64::new(0),
            num_out: AtomicU64::new(0),
            progress: Progress {
                id: config.id,
                expected_total: config.expected_total,
                interval: config.progress_interval,
                sink,
            },
        }
    }
}

impl<T: Send> ReadQueue<T> for BlockingReadQueue<T> {
    fn id(&self) -> &str {
        &self.progress.id
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            self.not_full.wait(&mut items);
        }
        items.push_back(item);
        self.num_in.fetch_add(1, Ordering::Release);
        drop(items);

        self.not_empty.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        let mut items = self.items.lock();
        while items.is_empty() && !self.done_pushing.load(Ordering::Acquire) {
            self.not_empty.wait(&mut items);
        }

        match items.pop_front() {
            Some(item) => {
                let popped = self.num_out.fetch_add(1, Ordering::Release) + 1;
                drop(items);
                self.not_full.notify_one();
                self.progress.on_pop(popped);
                Some(item)
            }
            None => {
                // End of stream: release every other waiting consumer
                drop(items);
                self.not_empty.notify_all();
                None
            }
        }
    }

    fn mark_done_pushing(&self) {
        let items = self.items.lock();
        self.done_pushing.store(true, Ordering::Release);
        drop(items);
        self.not_empty.notify_all();
    }

    fn is_done_pushing(&self) -> bool {
        self.done_pushing.load(Ordering::Acquire)
    }

    fn num_in(&self) -> u64 {
        self.num_in.load(Ordering::Acquire)
    }

    fn num_out(&self) -> u64 {
        self.num_out.load(Ordering::Acquire)
    }

    fn resident(&self) -> u64 {
        let _items = self.items.lock();
        self.num_in.load(Ordering::Acquire) - self.num_out.load(Ordering::Acquire)
    }

    fn pop_signals_end(&self) -> bool {
        true
    }
}

impl<T> Drop for BlockingReadQueue<T> {
    fn drop(&mut self) {
        self.progress.sink.debug(&format!(
            "read queue '{}' closed: {} added, {} consumed",
            self.progress.id,
            self.num_in.load(Ordering::Acquire),
            self.num_out.load(Ordering::Acquire)
        ));
    }
}

// ============================================================================
// LOCK-FREE BACKEND
// ============================================================================

pub struct LockFreeReadQueue<T> {
    queue: ArrayQueue<T>,
    done_pushing: AtomicBool,
    num_in: AtomicU64,
    num_out: AtomicU64,
    progress: Progress,
}

impl<T> LockFreeReadQueue<T> {
    pub fn new(config: QueueConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        sink.debug(&format!(
            "created lock-free read queue '{}' with capacity {}",
            config.id, config.capacity
        ));
        Self {
            queue: ArrayQueue::new(config.capacity),
            done_pushing: AtomicBool::new(false),
            num_in: AtomicU64::new(0),
            num_out: AtomicU64::new(0),
            progress: Progress {
                id: config.id,
                expected_total: config.expected_total,
                interval: config.progress_interval,
                sink,
            },
        }
    }
}

impl<T: Send> ReadQueue<T> for LockFreeReadQueue<T> {
    fn id(&self) -> &str {
        &self.progress.id
    }

    fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    fn push(&self, item: T) -> Result<(), T> {
        self.queue.push(item)?;
        self.num_in.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn pop(&self) -> Option<T> {
        let item = self.queue.pop()?;
        let popped = self.num_out.fetch_add(1, Ordering::Release) + 1;
        self.progress.on_pop(popped);
        Some(item)
    }

    fn mark_done_pushing(&self) {
        self.done_pushing.store(true, Ordering::Release);
    }

    fn is_done_pushing(&self) -> bool {
        self.done_pushing.load(Ordering::Acquire)
    }

    fn num_in(&self) -> u64 {
        self.num_in.load(Ordering::Acquire)
    }

    fn num_out(&self) -> u64 {
        self.num_out.load(Ordering::Acquire)
    }

    fn pop_signals_end(&self) -> bool {
        false
    }
}

impl<T> Drop for LockFreeReadQueue<T> {
    fn drop(&mut self) {
        self.progress.sink.debug(&format!(
            "read queue '{}' closed: {} added, {} consumed",
            self.progress.id,
            self.num_in.load(Ordering::Acquire),
            self.num_out.load(Ordering::Acquire)
        ));
    }
}

// ============================================================================
// POLLING HELPERS
// ============================================================================

/// Exponential backoff for polling the lock-free backend.
#[derive(Debug, Clone)]
pub struct Backoff {
    us: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { us: MIN_BACKOFF_US }
    }

    /// Reset backoff to minimum (after successful work).
    #[inline]
    pub fn reset(&mut self) {
        self.us = MIN_BACKOFF_US;
    }

    pub fn current_us(&self) -> u64 {
        self.us
    }

    /// Wait for the current backoff, then double it up to the maximum.
    /// At the minimum a yield is cheaper than a sleep.
    pub fn snooze(&mut self) {
        if self.us <= MIN_BACKOFF_US {
            std::thread::yield_now();
        } else {
            std::thread::sleep(Duration::from_micros(self.us));
        }
        self.us = (self.us * 2).min(MAX_BACKOFF_US);
    }
}

/// Push an item, retrying rejected attempts with exponential backoff until the
/// queue accepts it. Returns the number of rejected attempts.
///
/// Retries are unbounded in count but each wait is capped at
/// [`MAX_BACKOFF_US`]; processors always drain the queue, so a slot frees up.
pub fn push_with_backoff<T>(queue: &dyn ReadQueue<T>, mut item: T) -> u64 {
    let mut backoff = Backoff::new();
    let mut retries = 0u64;
    loop {
        match queue.push(item) {
            Ok(()) => return retries,
            Err(rejected) => {
                item = rejected;
                retries += 1;
                backoff.snooze();
            }
        }
    }
}

/// Next item from either backend, or `None` once the stream has ended.
pub fn next_item<T>(queue: &dyn ReadQueue<T>, backoff: &mut Backoff) -> Option<T> {
    if queue.pop_signals_end() {
        return queue.pop();
    }
    loop {
        // Read the flag before popping: if it was already set, an empty pop
        // means nothing else can arrive.
        let done = queue.is_done_pushing();
        if let Some(item) = queue.pop() {
            backoff.reset();
            return Some(item);
        }
        if done {
            return None;
        }
        backoff.snooze();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::MemorySink;
    use std::thread;

    fn sink() -> Arc<dyn DiagnosticSink> {
        Arc::new(MemorySink::new())
    }

    fn queue(backend: QueueBackend, capacity: usize) -> Arc<dyn ReadQueue<u64>> {
        new_read_queue(backend, QueueConfig::new("test", capacity, 0), sink())
    }

    #[test]
    fn test_blocking_fifo_single_thread() {
        let q = queue(QueueBackend::Blocking, 8);
        for i in 0..5 {
            q.push(i).unwrap();
        }
        q.mark_done_pushing();
        let drained: Vec<u64> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert_eq!(q.num_in(), 5);
        assert_eq!(q.num_out(), 5);
    }

    #[test]
    fn test_blocking_pop_returns_none_after_done_and_drained() {
        let q = queue(QueueBackend::Blocking, 2);
        q.push(1).unwrap();
        q.mark_done_pushing();
        assert_eq!(q.pop(), Some(1));
        for _ in 0..3 {
            assert_eq!(q.pop(), None);
        }
    }

    #[test]
    fn test_blocking_capacity_and_order_under_concurrency() {
        let capacity = 3;
        let q = queue(QueueBackend::Blocking, capacity);
        let producer_q = Arc::clone(&q);
        let producer = thread::spawn(move || {
            for i in 0..2_000u64 {
                producer_q.push(i).unwrap();
            }
            producer_q.mark_done_pushing();
        });

        let mut seen = Vec::new();
        while let Some(item) = q.pop() {
            assert!(q.resident() <= capacity as u64);
            seen.push(item);
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..2_000u64).collect::<Vec<_>>());
        assert_eq!(q.resident(), 0);
    }

    #[test]
    fn test_blocking_wakes_all_consumers_at_end() {
        let q = queue(QueueBackend::Blocking, 4);
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut n = 0;
                    while q.pop().is_some() {
                        n += 1;
                    }
                    n
                })
            })
            .collect();

        for i in 0..100 {
            q.push(i).unwrap();
        }
        q.mark_done_pushing();

        let total: u64 = consumers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_lock_free_rejects_when_full() {
        let q = queue(QueueBackend::LockFree, 2);
        assert!(q.push(1).is_ok());
        assert!(q.push(2).is_ok());
        assert_eq!(q.push(3), Err(3));
        assert_eq!(q.num_in(), 2);
        assert_eq!(q.resident(), 2);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.resident(), 1);
    }

    #[test]
    fn test_lock_free_empty_pop_is_not_end_of_stream() {
        let q = queue(QueueBackend::LockFree, 2);
        assert_eq!(q.pop(), None);
        assert!(!q.is_done_pushing());
        q.push(9).unwrap();
        q.mark_done_pushing();
        let mut backoff = Backoff::new();
        assert_eq!(next_item(q.as_ref(), &mut backoff), Some(9));
        assert_eq!(next_item(q.as_ref(), &mut backoff), None);
        assert_eq!(next_item(q.as_ref(), &mut backoff), None);
    }

    #[test]
    fn test_lock_free_many_consumers_see_every_item() {
        let q = queue(QueueBackend::LockFree, 4);
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut backoff = Backoff::new();
                    let mut got = Vec::new();
                    while let Some(item) = next_item(q.as_ref(), &mut backoff) {
                        got.push(item);
                    }
                    got
                })
            })
            .collect();

        for i in 0..1_000u64 {
            push_with_backoff(q.as_ref(), i);
        }
        q.mark_done_pushing();

        let mut all: Vec<u64> = consumers
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..1_000u64).collect::<Vec<_>>());
        assert_eq!(q.num_in(), 1_000);
        assert_eq!(q.num_out(), 1_000);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut b = Backoff::new();
        assert_eq!(b.current_us(), MIN_BACKOFF_US);
        for _ in 0..20 {
            b.snooze();
        }
        assert_eq!(b.current_us(), MAX_BACKOFF_US);
        b.reset();
        assert_eq!(b.current_us(), MIN_BACKOFF_US);
    }

    #[test]
    fn test_progress_notifications() {
        let mem = Arc::new(MemorySink::new());
        let q: BlockingReadQueue<u32> = BlockingReadQueue::new(
            QueueConfig::new("reads", 16, 10).with_progress_interval(4),
            mem.clone(),
        );
        for i in 0..10 {
            q.push(i).unwrap();
        }
        q.mark_done_pushing();
        while q.pop().is_some() {}

        let progress: Vec<String> = mem
            .messages()
            .into_iter()
            .filter(|(l, _)| *l == log::Level::Info)
            .map(|(_, m)| m)
            .collect();
        assert_eq!(
            progress,
            vec!["reads: popped 4 of 10 reads", "reads: popped 8 of 10 reads"]
        );
    }
}
