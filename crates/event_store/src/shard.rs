//! Shard - a bounded, time-ordered, shareable run of events.
//!
//! A shard holds a `(start, len)` window into a reference-counted backing
//! buffer. The buffer may be shared between any number of shards, each with
//! its own window; slicing one shard never affects another. A shard created
//! as the sole owner of a fresh buffer stays appendable until the buffer is
//! either full, tail-sliced, or shared with another shard - sharing seals it,
//! and the owning store allocates a fresh shard for the next append.

use std::sync::Arc;

use contracts::{Event, PipelineError, Timestamp, Timestamped};

#[derive(Debug, Clone)]
pub(crate) struct Shard {
    /// Shared backing buffer; events in [start, start + len) belong to us
    block: Arc<Vec<Event>>,
    start: usize,
    len: usize,
    capacity: usize,
    /// Created as exclusive owner; false for shards built on received buffers
    writable: bool,
    lowest_time: Timestamp,
    highest_time: Timestamp,
}

impl Shard {
    /// Create an empty, appendable shard as sole owner of a fresh buffer.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            block: Arc::new(Vec::with_capacity(capacity)),
            start: 0,
            len: 0,
            capacity,
            writable: true,
            lowest_time: 0,
            highest_time: 0,
        }
    }

    /// Create a shard over an existing buffer, acquiring shared ownership.
    ///
    /// The shard is never appendable: its capacity is pinned to the current
    /// length. The buffer must be non-empty and time-ordered; the caller
    /// validates this.
    pub(crate) fn from_shared(block: Arc<Vec<Event>>) -> Self {
        let len = block.len();
        let lowest_time = block.first().map_or(0, Event::timestamp);
        let highest_time = block.last().map_or(0, Event::timestamp);
        Self {
            block,
            start: 0,
            len,
            capacity: len,
            writable: false,
            lowest_time,
            highest_time,
        }
    }

    /// Events visible through this shard's window.
    #[inline]
    pub(crate) fn as_slice(&self) -> &[Event] {
        &self.block[self.start..self.start + self.len]
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Timestamp of the first event in the window. 0 when empty.
    #[inline]
    pub(crate) fn lowest_time(&self) -> Timestamp {
        self.lowest_time
    }

    /// Timestamp of the last event in the window. 0 when empty.
    #[inline]
    pub(crate) fn highest_time(&self) -> Timestamp {
        self.highest_time
    }

    /// True when an append would land in reachable space: the shard was
    /// created writable, has not been tail-sliced, is below capacity, and
    /// no other shard shares the backing buffer.
    pub(crate) fn can_store_more(&self) -> bool {
        self.writable
            && self.start + self.len == self.block.len()
            && self.block.len() < self.capacity
            && Arc::strong_count(&self.block) == 1
    }

    /// Room left in the backing buffer, in events.
    pub(crate) fn available_capacity(&self) -> usize {
        if self.writable {
            self.capacity - self.block.len()
        } else {
            0
        }
    }

    /// Drop `number` events from the front by moving the window only.
    pub(crate) fn slice_front(&mut self, number: usize) -> Result<(), PipelineError> {
        if number > self.len {
            return Err(PipelineError::out_of_range(
                "cannot slice more than length from shard",
            ));
        }

        self.start += number;
        self.len -= number;
        self.lowest_time = if self.len == 0 {
            0
        } else {
            self.block[self.start].timestamp()
        };
        Ok(())
    }

    /// Drop `number` events from the back by moving the window only.
    pub(crate) fn slice_back(&mut self, number: usize) -> Result<(), PipelineError> {
        if number > self.len {
            return Err(PipelineError::out_of_range(
                "cannot slice more than length from shard",
            ));
        }

        self.len -= number;
        self.highest_time = if self.len == 0 {
            0
        } else {
            self.block[self.start + self.len - 1].timestamp()
        };
        Ok(())
    }

    /// Index of the first event with timestamp >= `time`, within the window.
    #[inline]
    pub(crate) fn index_at_time(&self, time: Timestamp) -> usize {
        self.as_slice().partition_point(|e| e.timestamp() < time)
    }

    /// Drop every event with a timestamp before `time` from the front.
    /// Returns the number of events sliced off.
    pub(crate) fn slice_time_front(&mut self, time: Timestamp) -> usize {
        let index = self.index_at_time(time);
        // index is within the window, the range check cannot trip
        let _ = self.slice_front(index);
        index
    }

    /// Drop every event with a timestamp at or after `time` from the back.
    /// Returns the number of events sliced off.
    pub(crate) fn slice_time_back(&mut self, time: Timestamp) -> usize {
        let cut = self.len - self.index_at_time(time);
        let _ = self.slice_back(cut);
        cut
    }

    /// Append a single event without any validation.
    ///
    /// The caller must already have checked `can_store_more()` and that the
    /// event's timestamp does not precede `highest_time()`.
    pub(crate) fn push_unchecked(&mut self, event: Event) {
        debug_assert!(self.can_store_more());
        debug_assert!(self.is_empty() || event.timestamp() >= self.highest_time);

        self.highest_time = event.timestamp();
        if self.len == 0 {
            self.lowest_time = event.timestamp();
        }
        let block = Arc::get_mut(&mut self.block).expect("appendable shard is uniquely owned");
        block.push(event);
        self.len += 1;
    }

    /// Append another shard's events by copy, if capacity and ordering allow.
    /// Returns false and leaves both shards untouched otherwise.
    #[must_use]
    pub(crate) fn merge(&mut self, other: &Shard) -> bool {
        if !self.can_store_more() || self.available_capacity() < other.len() {
            return false;
        }

        if other.is_empty() {
            return true;
        }

        if !self.is_empty() && other.lowest_time() < self.highest_time {
            return false;
        }

        if self.is_empty() {
            self.lowest_time = other.lowest_time();
        }
        self.highest_time = other.highest_time();
        let block = Arc::get_mut(&mut self.block).expect("appendable shard is uniquely owned");
        block.extend_from_slice(other.as_slice());
        self.len += other.len();
        true
    }
}
