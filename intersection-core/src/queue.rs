//! Bounded FIFO of pair service requests.
//!
//! The queue holds at most one request per pair, which with two pairs gives a
//! capacity of two. Duplicate and overflow requests are refused with an
//! [`EnqueueError`]; the caller treats both as non-fatal because the
//! approach counters already record the demand.

use core::fmt;

use heapless::Deque;

use crate::approach::{PAIR_COUNT, PairId};

/// Fixed capacity of the request queue.
pub const REQUEST_QUEUE_CAPACITY: usize = PAIR_COUNT;

/// Error surfaced when a request cannot be enqueued.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnqueueError {
    /// Queue has reached its maximum capacity.
    QueueFull,
    /// A request for the pair is already waiting.
    AlreadyQueued,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::QueueFull => f.write_str("request queue full"),
            EnqueueError::AlreadyQueued => f.write_str("pair already queued"),
        }
    }
}

/// Returned by [`RequestQueue::dequeue`] when nothing is pending.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueEmpty;

#[derive(Clone, Debug, Default)]
pub struct RequestQueue {
    entries: Deque<PairId, REQUEST_QUEUE_CAPACITY>,
}

impl RequestQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Appends `pair` and returns the resulting queue depth.
    pub fn enqueue(&mut self, pair: PairId) -> Result<usize, EnqueueError> {
        if self.contains(pair) {
            return Err(EnqueueError::AlreadyQueued);
        }

        self.entries
            .push_back(pair)
            .map_err(|_| EnqueueError::QueueFull)?;
        Ok(self.entries.len())
    }

    /// Removes and returns the oldest request.
    pub fn dequeue(&mut self) -> Result<PairId, QueueEmpty> {
        self.entries.pop_front().ok_or(QueueEmpty)
    }

    #[must_use]
    pub fn peek(&self) -> Option<PairId> {
        self.entries.front().copied()
    }

    #[must_use]
    pub fn contains(&self, pair: PairId) -> bool {
        self.entries.iter().any(|queued| *queued == pair)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates pending requests oldest first.
    pub fn iter(&self) -> impl Iterator<Item = PairId> + '_ {
        self.entries.iter().copied()
    }
}
