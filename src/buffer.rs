//! Continuous buffer
//!
//! A bounded, shared, insertion-ordered buffer of recent samples. Producers
//! and readers may live on different threads: every mutation (push, flush
//! check, trim) happens under one write lock, so readers always see a
//! complete state.

use crate::config::BufferConfig;
use crate::types::Timestamped;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Bounded ring buffer with a threshold-triggered flush notification
#[derive(Debug)]
pub struct ContinuousBuffer<T> {
    items: Arc<RwLock<VecDeque<T>>>,
    capacity: usize,
    flush_threshold: f64,
    flush_tx: Option<Sender<Vec<T>>>,
}

impl<T> Clone for ContinuousBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            capacity: self.capacity,
            flush_threshold: self.flush_threshold,
            flush_tx: self.flush_tx.clone(),
        }
    }
}

impl<T: Clone> Default for ContinuousBuffer<T> {
    fn default() -> Self {
        Self::new(&BufferConfig::default())
    }
}

impl<T: Clone> ContinuousBuffer<T> {
    pub fn new(config: &BufferConfig) -> Self {
        Self::with_capacity(config.capacity, config.flush_threshold)
    }

    pub fn with_capacity(capacity: usize, flush_threshold: f64) -> Self {
        Self {
            items: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            flush_threshold,
            flush_tx: None,
        }
    }

    /// Deliver flush snapshots to `tx`. Delivery never blocks the producer;
    /// a dropped receiver is ignored.
    pub fn with_flush_channel(mut self, tx: Sender<Vec<T>>) -> Self {
        self.flush_tx = Some(tx);
        self
    }

    /// Append one item. Returns the flushed snapshot length if the flush
    /// threshold was reached.
    pub fn push(&self, item: T) -> Option<usize> {
        self.append(std::iter::once(item))
    }

    /// Append items in order.
    ///
    /// Push, flush check and trim happen as one step under the write lock.
    /// The flush snapshot is taken before trimming and is dispatched after
    /// the lock is released. Without a flush channel only the length is
    /// reported.
    pub fn append<I>(&self, new_items: I) -> Option<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let (len, snapshot) = {
            let mut items = self.write();
            items.extend(new_items);

            let fill_ratio = items.len() as f64 / self.capacity as f64;
            let flushed = if fill_ratio >= self.flush_threshold {
                let snapshot = self
                    .flush_tx
                    .as_ref()
                    .map(|_| items.iter().cloned().collect::<Vec<T>>());
                Some((items.len(), snapshot))
            } else {
                None
            };

            while items.len() > self.capacity {
                items.pop_front();
            }
            flushed?
        };

        if let (Some(tx), Some(snapshot)) = (&self.flush_tx, snapshot) {
            if tx.send(snapshot).is_err() {
                log::debug!("flush receiver dropped, snapshot of {} items discarded", len);
            } else {
                log::trace!("flush dispatched with {} items", len);
            }
        }
        Some(len)
    }

    /// Consistent copy of the current contents, oldest first
    pub fn items(&self) -> Vec<T> {
        self.read().iter().cloned().collect()
    }

    /// Remove everything; the allocation is kept
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Timestamped> ContinuousBuffer<T> {
    /// Items stamped at or after `since`, oldest first
    pub fn items_since(&self, since: DateTime<Utc>) -> Vec<T> {
        self.read()
            .iter()
            .filter(|item| item.timestamp() >= since)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::mpsc;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Stamped(DateTime<Utc>, u32);

    impl Timestamped for Stamped {
        fn timestamp(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_round_trip_within_capacity() {
        let buffer = ContinuousBuffer::with_capacity(10, 1.0);
        buffer.append(vec![1, 2, 3]);
        buffer.push(4);
        assert_eq!(buffer.items(), vec![1, 2, 3, 4]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_keeps_most_recent_beyond_capacity() {
        let buffer = ContinuousBuffer::with_capacity(5, 1.0);
        buffer.append(0..12);
        assert_eq!(buffer.items(), vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_flush_fires_at_threshold_with_pre_trim_snapshot() {
        let (tx, rx) = mpsc::channel();
        let buffer = ContinuousBuffer::with_capacity(5, 0.8).with_flush_channel(tx);

        assert_eq!(buffer.append(vec![1, 2, 3]), None);
        assert!(rx.try_recv().is_err());

        assert_eq!(buffer.push(4), Some(4));
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3, 4]);

        // Snapshot includes the overflow that trimming then drops
        assert_eq!(buffer.append(vec![5, 6]), Some(6));
        assert_eq!(rx.try_recv().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(buffer.items(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_flush_is_not_destructive() {
        let buffer = ContinuousBuffer::with_capacity(4, 0.5);
        assert_eq!(buffer.append(vec![1, 2]), Some(2));
        assert_eq!(buffer.items(), vec![1, 2]);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let buffer = ContinuousBuffer::with_capacity(2, 0.5).with_flush_channel(tx);
        assert_eq!(buffer.push(1), Some(1));
        assert_eq!(buffer.items(), vec![1]);
    }

    #[test]
    fn test_clear_keeps_working() {
        let buffer = ContinuousBuffer::with_capacity(3, 1.0);
        buffer.append(vec![1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);
        buffer.push(9);
        assert_eq!(buffer.items(), vec![9]);
    }

    #[test]
    fn test_items_since() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        let buffer = ContinuousBuffer::with_capacity(100, 1.0);
        for i in 0..10 {
            buffer.push(Stamped(start + Duration::seconds(i * 10), i as u32));
        }

        let recent = buffer.items_since(start + Duration::seconds(70));
        let ids: Vec<u32> = recent.iter().map(|s| s.1).collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn test_readers_never_see_partial_appends() {
        let buffer: ContinuousBuffer<u64> = ContinuousBuffer::with_capacity(64, 0.8);

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for batch in 0..500u64 {
                    // Each batch is 4 consecutive values
                    buffer.append((0..4).map(|i| batch * 4 + i));
                }
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let items = buffer.items();
                        assert!(items.len() <= 64);
                        assert!(items.len() % 4 == 0);
                        assert!(items.windows(2).all(|w| w[1] == w[0] + 1));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(buffer.len(), 64);
    }
}
