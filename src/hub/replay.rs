//! Bounded replay history
//!
//! Keeps the most recent published events so a late subscriber can be
//! backfilled before it starts observing live publishes.

use std::collections::VecDeque;

use super::event::Event;

/// Bounded FIFO history of recent events
///
/// Eviction is strict FIFO: once `capacity` entries are held, appending
/// drops the oldest entry first. Stored sequence numbers are strictly
/// increasing and contiguous with the hub's live counter.
#[derive(Debug)]
pub struct ReplayBuffer {
    entries: VecDeque<Event>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a buffer holding at most `capacity` events (0 disables replay)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry when at capacity
    pub fn push(&mut self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    /// Current contents in ascending sequence order
    ///
    /// Does not mutate state. With fewer events published than `capacity`,
    /// simply returns what exists.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;

    use super::*;

    fn event(seq: u64) -> Event {
        Event::new(seq, Bytes::from(format!("payload-{seq}")), SystemTime::now())
    }

    #[test]
    fn test_underflow_returns_what_exists() {
        let mut buffer = ReplayBuffer::new(8);
        buffer.push(event(0));
        buffer.push(event(1));

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].seq, 0);
        assert_eq!(snapshot[1].seq, 1);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let mut buffer = ReplayBuffer::new(3);
        for seq in 0..5 {
            buffer.push(event(seq));
        }

        let seqs: Vec<u64> = buffer.snapshot().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_sequences_stay_contiguous_and_ascending() {
        let mut buffer = ReplayBuffer::new(4);
        for seq in 0..100 {
            buffer.push(event(seq));
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 4);
        for pair in snapshot.windows(2) {
            assert_eq!(pair[1].seq, pair[0].seq + 1);
        }
        assert_eq!(snapshot.last().map(|e| e.seq), Some(99));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut buffer = ReplayBuffer::new(0);
        buffer.push(event(0));

        assert!(buffer.is_empty());
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.push(event(0));

        let _ = buffer.snapshot();
        let _ = buffer.snapshot();
        assert_eq!(buffer.len(), 1);
    }
}
