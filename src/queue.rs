//! Bounded, thread-safe channel implementation.
//!
//! [`item_queue`] splits a queue into a [`QueueSender`] for the producer
//! and a [`QueueReceiver`] that the engine pulls from through the
//! [`Channel`] trait. The queue provides:
//! - Bounded buffering (the producer blocks while `capacity` items are queued)
//! - Segment updates serialized with the items (not counted against capacity)
//! - End-of-stream signalling independent from the other channel
//! - Flushing that discards everything queued
//!
//! # Example
//!
//! ```rust
//! use tandem::channel::Channel;
//! use tandem::clock::ClockTime;
//! use tandem::item::Item;
//! use tandem::queue::item_queue;
//!
//! let (tx, mut rx) = item_queue::<&str>(8);
//! tx.push(Item::at(ClockTime::from_millis(40), "cc")).unwrap();
//! tx.finish();
//!
//! assert!(rx.peek().is_some());
//! assert_eq!(rx.pop().map(|i| i.payload), Some("cc"));
//! assert!(rx.is_exhausted());
//! ```

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::item::{Item, ItemTiming};
use crate::segment::TimeSegment;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Create a queue holding at most `capacity` items (clamped to at least 1).
pub fn item_queue<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let inner = Arc::new(QueueInner {
        state: Mutex::new(QueueState {
            entries: VecDeque::with_capacity(capacity.clamp(1, 1024)),
            capacity: capacity.max(1),
            queued_items: 0,
            eos: false,
            flushing: false,
            total_pushed: 0,
            total_popped: 0,
            segments: 0,
        }),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
    });
    (
        QueueSender {
            inner: Arc::clone(&inner),
        },
        QueueReceiver { inner },
    )
}

/// Create a queue, rejecting a zero capacity.
pub fn try_item_queue<T>(capacity: usize) -> Result<(QueueSender<T>, QueueReceiver<T>)> {
    if capacity == 0 {
        return Err(Error::Config("queue capacity must be at least 1".into()));
    }
    Ok(item_queue(capacity))
}

enum Entry<T> {
    Item(Item<T>),
    Segment(TimeSegment),
}

struct QueueState<T> {
    entries: VecDeque<Entry<T>>,
    capacity: usize,
    queued_items: usize,
    eos: bool,
    flushing: bool,
    total_pushed: u64,
    total_popped: u64,
    segments: u64,
}

impl<T> QueueState<T> {
    fn is_full(&self) -> bool {
        self.queued_items >= self.capacity
    }

    fn check_open(&self) -> Result<()> {
        if self.flushing {
            return Err(Error::Flushing);
        }
        if self.eos {
            return Err(Error::EndOfStream);
        }
        Ok(())
    }
}

struct QueueInner<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> QueueInner<T> {
    fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            queued_items: state.queued_items,
            total_pushed: state.total_pushed,
            total_popped: state.total_popped,
            segments: state.segments,
        }
    }
}

// ============================================================================
// Sender
// ============================================================================

/// Producer side of an item queue.
pub struct QueueSender<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> QueueSender<T> {
    /// Push an item, blocking while the queue is full.
    pub fn push(&self, item: Item<T>) -> Result<()> {
        self.push_timeout(item, None)
    }

    /// Push an item, blocking at most `timeout` while the queue is full.
    pub fn push_timeout(&self, item: Item<T>, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();

        while state.is_full() && !state.flushing && !state.eos {
            match deadline {
                Some(deadline) => {
                    let timed_out = self
                        .inner
                        .not_full
                        .wait_until(&mut state, deadline)
                        .timed_out();
                    if timed_out && state.is_full() && !state.flushing && !state.eos {
                        return Err(Error::Timeout);
                    }
                }
                None => self.inner.not_full.wait(&mut state),
            }
        }
        state.check_open()?;

        state.entries.push_back(Entry::Item(item));
        state.queued_items += 1;
        state.total_pushed += 1;
        self.inner.not_empty.notify_all();
        Ok(())
    }

    /// Queue a segment update ahead of the items pushed after it.
    ///
    /// Never blocks.
    pub fn push_segment(&self, segment: TimeSegment) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.check_open()?;
        state.entries.push_back(Entry::Segment(segment));
        state.segments += 1;
        self.inner.not_empty.notify_all();
        Ok(())
    }

    /// Signal end of stream.
    pub fn finish(&self) {
        let mut state = self.inner.state.lock();
        state.eos = true;
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    /// Discard everything queued and clear end of stream.
    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        state.entries.clear();
        state.queued_items = 0;
        state.eos = false;
        self.inner.not_full.notify_all();
        self.inner.not_empty.notify_all();
    }

    /// Set flushing mode (pushes fail and blocked pushes return).
    pub fn set_flushing(&self, flushing: bool) {
        let mut state = self.inner.state.lock();
        state.flushing = flushing;
        if flushing {
            self.inner.not_empty.notify_all();
            self.inner.not_full.notify_all();
        }
    }

    /// Get statistics about the queue.
    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Consumer side of an item queue.
pub struct QueueReceiver<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> QueueReceiver<T> {
    /// Wait until an entry is queued or end of stream is signalled.
    ///
    /// Returns `false` if `timeout` expired (or the queue is flushing)
    /// with nothing to read.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.entries.is_empty() && !state.eos && !state.flushing {
            if self
                .inner
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        !state.entries.is_empty() || state.eos
    }

    /// Number of queued items (segments excluded).
    pub fn len(&self) -> usize {
        self.inner.state.lock().queued_items
    }

    /// Whether no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get statistics about the queue.
    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }
}

impl<T> Channel for QueueReceiver<T> {
    type Payload = T;

    fn peek(&self) -> Option<ItemTiming> {
        match self.inner.state.lock().entries.front() {
            Some(Entry::Item(item)) => Some(item.timing()),
            _ => None,
        }
    }

    fn pop(&mut self) -> Option<Item<T>> {
        let mut state = self.inner.state.lock();
        if !matches!(state.entries.front(), Some(Entry::Item(_))) {
            return None;
        }
        match state.entries.pop_front() {
            Some(Entry::Item(item)) => {
                state.queued_items -= 1;
                state.total_popped += 1;
                self.inner.not_full.notify_one();
                Some(item)
            }
            _ => None,
        }
    }

    fn is_exhausted(&self) -> bool {
        let state = self.inner.state.lock();
        state.eos && state.entries.is_empty()
    }

    fn take_segment(&mut self) -> Option<TimeSegment> {
        let mut state = self.inner.state.lock();
        match state.entries.front() {
            Some(Entry::Segment(segment)) => {
                let segment = *segment;
                state.entries.pop_front();
                Some(segment)
            }
            _ => None,
        }
    }
}

/// Statistics about queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently queued.
    pub queued_items: usize,
    /// Total items pushed.
    pub total_pushed: u64,
    /// Total items popped.
    pub total_popped: u64,
    /// Total segment updates pushed.
    pub segments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockTime;
    use std::thread;

    fn item(ms: u64) -> Item<u64> {
        Item::at(ClockTime::from_millis(ms), ms)
    }

    #[test]
    fn test_push_pop_order() {
        let (tx, mut rx) = item_queue(4);
        tx.push(item(0)).unwrap();
        tx.push(item(40)).unwrap();

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.pop().map(|i| i.payload), Some(0));
        assert_eq!(rx.pop().map(|i| i.payload), Some(40));
        assert!(rx.pop().is_none());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (tx, rx) = item_queue(4);
        tx.push(item(80)).unwrap();

        let timing = rx.peek().unwrap();
        assert_eq!(timing.timestamp, Some(ClockTime::from_millis(80)));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_segment_blocks_head_until_taken() {
        let (tx, mut rx) = item_queue(4);
        let seg = TimeSegment::new().with_offset(ClockTime::from_secs(1));
        tx.push_segment(seg).unwrap();
        tx.push(item(0)).unwrap();

        assert!(rx.peek().is_none());
        assert!(rx.pop().is_none());
        assert_eq!(rx.take_segment(), Some(seg));
        assert!(rx.take_segment().is_none());
        assert!(rx.peek().is_some());
        assert_eq!(rx.stats().segments, 1);
    }

    #[test]
    fn test_eos() {
        let (tx, rx) = item_queue::<u64>(4);
        assert!(!rx.is_exhausted());
        tx.finish();
        assert!(rx.is_exhausted());
        assert_eq!(tx.push(item(0)), Err(Error::EndOfStream));
        assert!(rx.wait_for_data(Duration::from_millis(1)));
    }

    #[test]
    fn test_not_exhausted_while_entries_remain() {
        let (tx, mut rx) = item_queue(4);
        tx.push_segment(TimeSegment::new()).unwrap();
        tx.push(item(0)).unwrap();
        tx.finish();

        assert!(!rx.is_exhausted());
        assert!(rx.take_segment().is_some());
        assert!(!rx.is_exhausted());
        assert!(rx.pop().is_some());
        assert!(rx.is_exhausted());
    }

    #[test]
    fn test_flush_clears_eos_and_entries() {
        let (tx, rx) = item_queue(4);
        tx.push(item(0)).unwrap();
        tx.finish();
        tx.flush();

        assert!(rx.is_empty());
        assert!(!rx.is_exhausted());
        assert!(tx.push(item(40)).is_ok());
    }

    #[test]
    fn test_flushing_rejects_push() {
        let (tx, _rx) = item_queue(4);
        tx.set_flushing(true);
        assert_eq!(tx.push(item(0)), Err(Error::Flushing));
        tx.set_flushing(false);
        assert!(tx.push(item(0)).is_ok());
    }

    #[test]
    fn test_push_timeout_when_full() {
        let (tx, _rx) = item_queue(1);
        tx.push(item(0)).unwrap();
        let result = tx.push_timeout(item(40), Some(Duration::from_millis(10)));
        assert_eq!(result, Err(Error::Timeout));
    }

    #[test]
    fn test_blocked_push_resumes_after_pop() {
        let (tx, mut rx) = item_queue(1);
        tx.push(item(0)).unwrap();

        let producer = thread::spawn(move || tx.push(item(40)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.pop().map(|i| i.payload), Some(0));

        producer.join().unwrap().unwrap();
        assert_eq!(rx.pop().map(|i| i.payload), Some(40));
    }

    #[test]
    fn test_wait_for_data_times_out() {
        let (_tx, rx) = item_queue::<u64>(1);
        assert!(!rx.wait_for_data(Duration::from_millis(5)));
    }

    #[test]
    fn test_try_item_queue_rejects_zero() {
        assert!(matches!(try_item_queue::<u8>(0), Err(Error::Config(_))));
        assert!(try_item_queue::<u8>(1).is_ok());
    }

    #[test]
    fn test_stats() {
        let (tx, mut rx) = item_queue(4);
        tx.push(item(0)).unwrap();
        tx.push(item(40)).unwrap();
        rx.pop();

        let stats = rx.stats();
        assert_eq!(stats.queued_items, 1);
        assert_eq!(stats.total_pushed, 2);
        assert_eq!(stats.total_popped, 1);
    }
}
