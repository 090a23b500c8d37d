//! EventStore - an ordered collection of shards with array-like, time-indexed
//! access.
//!
//! An `EventStore` is a sequence of consecutive events, all non-decreasing in
//! time, held in shards of bounded size. Copying a store is a shallow
//! operation with shared ownership of the shards. Slicing by index or by time
//! only adjusts bookkeeping; no event data is copied. A cumulative offset
//! index over the shards gives O(log n) index and time lookups.

use std::fmt;
use std::sync::Arc;

use contracts::{Event, PipelineError, Timestamp};

use crate::shard::Shard;

/// Default capacity for newly allocated shards, in events.
pub const DEFAULT_SHARD_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct EventStore {
    /// Shards in non-decreasing time order
    shards: Vec<Shard>,
    /// Cumulative event-count offset of each shard
    offsets: Vec<usize>,
    /// Total number of events
    total_len: usize,
    /// Capacity used when a new shard has to be allocated
    shard_capacity: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore {
    /// Create an empty store. Allocates no memory until data arrives.
    pub fn new() -> Self {
        Self {
            shards: Vec::new(),
            offsets: Vec::new(),
            total_len: 0,
            shard_capacity: DEFAULT_SHARD_CAPACITY,
        }
    }

    /// Build a store that takes shared ownership of an existing event buffer.
    ///
    /// The whole buffer must be internally time-ordered; an out-of-order pair
    /// fails the construction.
    pub fn from_shared(buffer: Arc<Vec<Event>>) -> Result<Self, PipelineError> {
        if buffer.is_empty() {
            return Ok(Self::new());
        }

        if let Some(pair) = buffer.windows(2).find(|w| w[1].timestamp < w[0].timestamp) {
            return Err(PipelineError::ordering(
                pair[0].timestamp,
                pair[1].timestamp,
            ));
        }

        Ok(Self::from_shards(
            vec![Shard::from_shared(buffer)],
            DEFAULT_SHARD_CAPACITY,
        ))
    }

    /// Build a store from an owned event buffer. See [`EventStore::from_shared`].
    pub fn from_events(events: Vec<Event>) -> Result<Self, PipelineError> {
        Self::from_shared(Arc::new(events))
    }

    /// Rebuild a store from a shard list, recomputing the offset index.
    /// Empty shards are dropped.
    pub(crate) fn from_shards(shards: Vec<Shard>, shard_capacity: usize) -> Self {
        let mut store = Self {
            shards: Vec::with_capacity(shards.len()),
            offsets: Vec::with_capacity(shards.len()),
            total_len: 0,
            shard_capacity,
        };

        for shard in shards {
            if shard.is_empty() {
                continue;
            }
            store.offsets.push(store.total_len);
            store.total_len += shard.len();
            store.shards.push(shard);
        }

        store
    }

    /// Append a single event.
    ///
    /// Allocates a fresh shard when the last one can no longer accept
    /// appends. Fails with an ordering error if the event's timestamp
    /// precedes the store's highest time; equal timestamps are allowed.
    pub fn push(&mut self, event: Event) -> Result<(), PipelineError> {
        if !self.is_empty() && self.highest_time() > event.timestamp {
            return Err(PipelineError::ordering(self.highest_time(), event.timestamp));
        }

        let needs_new_shard = self.shards.last().map_or(true, |s| !s.can_store_more());
        if needs_new_shard {
            self.offsets.push(self.total_len);
            self.shards.push(Shard::with_capacity(self.shard_capacity));
        }
        if let Some(last) = self.shards.last_mut() {
            last.push_unchecked(event);
        }
        self.total_len += 1;
        Ok(())
    }

    /// Merge another store's events behind this store's.
    ///
    /// Shallow where possible: each of `other`'s shards is first offered to
    /// this store's last shard for a copy-merge, and referenced as-is when
    /// that fails. Fails with an ordering error if `other` starts before this
    /// store's highest time.
    pub fn merge(&mut self, other: &EventStore) -> Result<(), PipelineError> {
        if other.is_empty() {
            return Ok(());
        }

        if !self.is_empty() && self.highest_time() > other.lowest_time() {
            return Err(PipelineError::ordering(
                self.highest_time(),
                other.lowest_time(),
            ));
        }

        for shard in &other.shards {
            let merged = match self.shards.last_mut() {
                Some(last) => last.merge(shard),
                None => false,
            };

            if !merged {
                self.offsets.push(self.total_len);
                self.shards.push(shard.clone());
            }

            self.total_len += shard.len();
        }

        Ok(())
    }

    /// Total number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.total_len
    }

    /// True when the store holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    /// Timestamp of the first event. 0 when empty.
    #[inline]
    pub fn lowest_time(&self) -> Timestamp {
        self.shards.first().map_or(0, Shard::lowest_time)
    }

    /// Timestamp of the last event. 0 when empty.
    #[inline]
    pub fn highest_time(&self) -> Timestamp {
        self.shards.last().map_or(0, Shard::highest_time)
    }

    /// Time span covered by the store, in microseconds.
    #[inline]
    pub fn duration(&self) -> i64 {
        self.highest_time() - self.lowest_time()
    }

    /// Event rate in events per second. 0 for zero-duration stores.
    pub fn rate(&self) -> f64 {
        let duration_micros = self.duration();
        if duration_micros == 0 {
            return 0.0;
        }
        self.total_len as f64 / (duration_micros as f64 * 1e-6)
    }

    /// First event of the store.
    pub fn front(&self) -> Option<&Event> {
        self.shards.first().and_then(|s| s.as_slice().first())
    }

    /// Last event of the store.
    pub fn back(&self) -> Option<&Event> {
        self.shards.last().and_then(|s| s.as_slice().last())
    }

    /// True if `timestamp` lies within `[lowest_time, highest_time]`.
    pub fn within_time_range(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.lowest_time() && timestamp <= self.highest_time()
    }

    /// Capacity used for newly allocated shards.
    pub fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }

    /// Set the capacity for shards allocated from now on. Does not affect
    /// existing shards. Clamped to at least 1.
    pub fn set_shard_capacity(&mut self, shard_capacity: usize) {
        self.shard_capacity = shard_capacity.max(1);
    }

    /// Number of shards currently referenced.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Event at `index`, or None past the end. O(log n).
    pub fn get(&self, index: usize) -> Option<&Event> {
        if index >= self.total_len {
            return None;
        }

        let shard_index = self.offsets.partition_point(|&o| o <= index) - 1;
        Some(&self.shards[shard_index].as_slice()[index - self.offsets[shard_index]])
    }

    /// Event at `index`, with a range check.
    pub fn at(&self, index: usize) -> Result<&Event, PipelineError> {
        self.get(index)
            .ok_or_else(|| PipelineError::out_of_range("index exceeds EventStore range"))
    }

    /// Shallow slice of `length` events starting at index `start`.
    ///
    /// The new store shares the relevant shards, narrowed at the boundary
    /// shards. Fails when `start + length` exceeds the store size.
    pub fn slice(&self, start: usize, length: usize) -> Result<EventStore, PipelineError> {
        if start + length > self.total_len {
            return Err(PipelineError::out_of_range("slice exceeds EventStore range"));
        }

        if length == 0 {
            return Ok(Self::from_shards(Vec::new(), self.shard_capacity));
        }

        let low = self.offsets.partition_point(|&o| o <= start) - 1;
        let high = self.offsets.partition_point(|&o| o < start + length);
        let mut shards = self.shards[low..high].to_vec();

        let front_amount = start - self.offsets[low];
        let back_amount = match shards.last() {
            Some(last) => self.offsets[high - 1] + last.len() - (start + length),
            None => 0,
        };
        if let Some(first) = shards.first_mut() {
            first.slice_front(front_amount)?;
        }
        if let Some(last) = shards.last_mut() {
            last.slice_back(back_amount)?;
        }

        Ok(Self::from_shards(shards, self.shard_capacity))
    }

    /// Shallow slice from index `start` to the end of the store.
    pub fn slice_from(&self, start: usize) -> EventStore {
        if start == 0 || self.total_len == 0 {
            return self.clone();
        }

        if start >= self.total_len {
            return Self::from_shards(Vec::new(), self.shard_capacity);
        }

        let low = self.offsets.partition_point(|&o| o <= start) - 1;
        let mut shards = self.shards[low..].to_vec();
        // start is inside shard `low`, the range check cannot trip
        let _ = shards[0].slice_front(start - self.offsets[low]);

        Self::from_shards(shards, self.shard_capacity)
    }

    /// Shallow slice holding at most `length` events off the back.
    pub fn slice_back(&self, length: usize) -> EventStore {
        if length >= self.total_len {
            self.clone()
        } else {
            // bounds just checked, cannot fail
            self.slice(self.total_len - length, length)
                .unwrap_or_else(|_| Self::from_shards(Vec::new(), self.shard_capacity))
        }
    }

    /// Index of the first event with a timestamp at or after `time`; the
    /// store length when every event is older. O(log n).
    pub fn index_at_time(&self, time: Timestamp) -> usize {
        let shard_index = self.shards.partition_point(|s| s.highest_time() < time);
        if shard_index == self.shards.len() {
            return self.total_len;
        }
        self.offsets[shard_index] + self.shards[shard_index].index_at_time(time)
    }

    /// Shallow slice of the half-open time range `[start_time, end_time)`,
    /// also reporting the event indices the range resolved to.
    ///
    /// Returns an empty store and zero indices when no event falls in range.
    pub fn slice_time_indexed(
        &self,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> (EventStore, usize, usize) {
        let low = self
            .shards
            .partition_point(|s| s.highest_time() < start_time);
        let high = self.shards.partition_point(|s| s.lowest_time() < end_time);

        if low >= high {
            return (Self::from_shards(Vec::new(), self.shard_capacity), 0, 0);
        }

        let mut shards = self.shards[low..high].to_vec();
        let mut new_length: usize = shards.iter().map(Shard::len).sum();

        let cut_front = shards[0].slice_time_front(start_time);
        let cut_back = match shards.last_mut() {
            Some(last) => last.slice_time_back(end_time),
            None => 0,
        };
        new_length -= cut_front + cut_back;

        if new_length == 0 {
            return (Self::from_shards(Vec::new(), self.shard_capacity), 0, 0);
        }

        let start_index = self.offsets[low] + cut_front;
        (
            Self::from_shards(shards, self.shard_capacity),
            start_index,
            start_index + new_length,
        )
    }

    /// Shallow slice of the half-open time range `[start_time, end_time)`.
    pub fn slice_time(&self, start_time: Timestamp, end_time: Timestamp) -> EventStore {
        self.slice_time_indexed(start_time, end_time).0
    }

    /// Shallow slice from `start_time` to the end of the store. A negative
    /// `start_time` counts back from the highest time.
    pub fn slice_time_from(&self, start_time: Timestamp) -> EventStore {
        let start = if start_time < 0 {
            self.highest_time() + start_time
        } else {
            start_time
        };
        // + 1 to include the events that happen at the last time
        self.slice_time(start, self.highest_time() + 1)
    }

    /// Slice off the front so the remaining events fit `target_rate` events
    /// per second over the store's duration. Stores already below the target
    /// rate are returned unchanged.
    pub fn slice_rate(&self, target_rate: f64) -> Result<EventStore, PipelineError> {
        if target_rate <= 0.0 {
            return Err(PipelineError::invalid_argument(
                "slice_rate expects a positive target rate",
            ));
        }

        if self.rate() < target_rate {
            return Ok(self.clone());
        }

        let duration_seconds = self.duration() as f64 * 1e-6;
        let count = (target_rate * duration_seconds) as usize;
        Ok(self.slice_back(count))
    }

    /// Erase `length` events starting at index `start`.
    ///
    /// Boundary shards are trimmed, fully covered shards are dropped, and a
    /// range interior to a single shard splits it in two windows over the
    /// same backing buffer. Data shared with other stores is unaffected.
    pub fn erase(&mut self, start: usize, length: usize) -> Result<(), PipelineError> {
        if start > self.total_len {
            return Err(PipelineError::out_of_range(
                "first index is beyond the size of the store",
            ));
        }

        if start + length > self.total_len {
            return Err(PipelineError::out_of_range(
                "erase range exceeds EventStore range",
            ));
        }

        if length == 0 {
            return Ok(());
        }

        let end = start + length;
        let mut kept: Vec<Shard> = Vec::with_capacity(self.shards.len() + 1);

        for (index, shard) in self.shards.iter().enumerate() {
            let shard_begin = self.offsets[index];
            let shard_end = shard_begin + shard.len();

            if shard_end <= start || shard_begin >= end {
                kept.push(shard.clone());
                continue;
            }

            // head piece left of the erased range
            if shard_begin < start {
                let mut head = shard.clone();
                head.slice_back(shard_end - start)?;
                kept.push(head);
            }

            // tail piece right of the erased range; for an interior range this
            // is the second window of a split shard
            if shard_end > end {
                let mut tail = shard.clone();
                tail.slice_front(end - shard_begin)?;
                kept.push(tail);
            }
        }

        *self = Self::from_shards(kept, self.shard_capacity);
        Ok(())
    }

    /// Erase all events in the half-open time range `[start_time, end_time)`.
    /// Returns the number of events erased.
    pub fn erase_time(
        &mut self,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<usize, PipelineError> {
        if start_time > end_time {
            return Err(PipelineError::invalid_argument(
                "start time is greater than end time in erase_time",
            ));
        }

        if self.is_empty() {
            return Ok(0);
        }

        let low = self
            .shards
            .partition_point(|s| s.highest_time() < start_time);
        if low == self.shards.len() {
            return Ok(0);
        }

        let high = self.shards.partition_point(|s| s.highest_time() < end_time);
        let high = high.min(self.shards.len() - 1).max(low);

        let erase_start = self.offsets[low] + self.shards[low].index_at_time(start_time);
        let erase_end = self.offsets[high] + self.shards[high].index_at_time(end_time);
        let erase_length = erase_end.saturating_sub(erase_start);

        self.erase(erase_start, erase_length)?;
        Ok(erase_length)
    }

    /// Keep at least `duration` microseconds of the latest events, dropping
    /// older data at whole-shard granularity. The retained duration is a
    /// lower bound, never less than requested.
    pub fn retain_duration(&mut self, duration: i64) {
        if self.is_empty() {
            return;
        }

        let start_time = self.highest_time() - duration;
        let boundary = self
            .shards
            .partition_point(|s| s.highest_time() < start_time);

        // keep one shard below the boundary so at least `duration` survives
        let drop_count = boundary.saturating_sub(1);
        if drop_count == 0 {
            return;
        }

        let kept = self.shards.split_off(drop_count);
        *self = Self::from_shards(kept, self.shard_capacity);
    }

    /// Deep copy of all events into one flat contiguous buffer.
    pub fn to_vec(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.total_len);
        for shard in &self.shards {
            events.extend_from_slice(shard.as_slice());
        }
        events
    }

    /// Iterate events in time order across shard boundaries.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            shards: &self.shards,
            front_shard: 0,
            front_offset: 0,
            back_shard: self.shards.len(),
            back_offset: 0,
            remaining: self.total_len,
        }
    }
}

impl std::ops::Index<usize> for EventStore {
    type Output = Event;

    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Some(event) => event,
            None => panic!(
                "index {index} exceeds EventStore range (len {})",
                self.total_len
            ),
        }
    }
}

impl fmt::Display for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventStore containing {} events within {}µs duration; time range within [{}; {}]",
            self.len(),
            self.duration(),
            self.lowest_time(),
            self.highest_time()
        )
    }
}

/// Bidirectional iterator over the events of an [`EventStore`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    shards: &'a [Shard],
    front_shard: usize,
    front_offset: usize,
    back_shard: usize,
    back_offset: usize,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while self.front_offset >= self.shards[self.front_shard].len() {
            self.front_shard += 1;
            self.front_offset = 0;
        }

        let event = &self.shards[self.front_shard].as_slice()[self.front_offset];
        self.front_offset += 1;
        self.remaining -= 1;
        Some(event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while self.back_offset == 0 {
            self.back_shard -= 1;
            self.back_offset = self.shards[self.back_shard].len();
        }

        self.back_offset -= 1;
        self.remaining -= 1;
        Some(&self.shards[self.back_shard].as_slice()[self.back_offset])
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a EventStore {
    type Item = &'a Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(timestamp: Timestamp) -> Event {
        Event::new(timestamp, 0, 0, true)
    }

    /// Store with shard capacity 2 holding timestamps [1,2],[3,4],[5,6].
    fn three_shard_store() -> EventStore {
        let mut store = EventStore::new();
        store.set_shard_capacity(2);
        for t in 1..=6 {
            store.push(make_event(t)).unwrap();
        }
        assert_eq!(store.shard_count(), 3);
        store
    }

    fn timestamps(store: &EventStore) -> Vec<Timestamp> {
        store.iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn test_push_monotonicity_enforced() {
        let mut store = EventStore::new();
        store.push(make_event(5)).unwrap();

        let err = store.push(make_event(3)).unwrap_err();
        assert!(matches!(err, PipelineError::OrderingViolation { .. }));
        // store left unchanged
        assert_eq!(timestamps(&store), vec![5]);

        // equal timestamps are allowed
        store.push(make_event(5)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_slice_by_index() {
        let store = three_shard_store();
        let slice = store.slice(2, 3).unwrap();
        assert_eq!(timestamps(&slice), vec![3, 4, 5]);

        assert!(store.slice(4, 3).is_err());
        assert!(store.slice(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_slice_round_trip() {
        let store = three_shard_store();
        let full = store.slice(0, store.len()).unwrap();
        assert_eq!(timestamps(&full), timestamps(&store));

        let by_time = store.slice_time(store.lowest_time(), store.highest_time() + 1);
        assert_eq!(timestamps(&by_time), timestamps(&store));
    }

    #[test]
    fn test_slice_time_end_exclusive() {
        let store = three_shard_store();
        let slice = store.slice_time(3, 6);
        assert_eq!(timestamps(&slice), vec![3, 4, 5]);

        let (_, start, end) = store.slice_time_indexed(3, 6);
        assert_eq!((start, end), (2, 5));
    }

    #[test]
    fn test_slice_time_empty_range() {
        let store = three_shard_store();
        let (slice, start, end) = store.slice_time_indexed(100, 200);
        assert!(slice.is_empty());
        assert_eq!((start, end), (0, 0));
    }

    #[test]
    fn test_slice_time_from_negative_is_relative_to_end() {
        let store = three_shard_store();
        let slice = store.slice_time_from(-2);
        assert_eq!(timestamps(&slice), vec![4, 5, 6]);
    }

    #[test]
    fn test_slice_back() {
        let store = three_shard_store();
        assert_eq!(timestamps(&store.slice_back(2)), vec![5, 6]);
        assert_eq!(store.slice_back(100).len(), 6);
    }

    #[test]
    fn test_slicing_leaves_original_untouched() {
        let store = three_shard_store();
        let slice = store.slice(1, 4).unwrap();
        let nested = slice.slice(1, 2).unwrap();

        assert_eq!(timestamps(&nested), vec![3, 4]);
        assert_eq!(slice.len(), 4);
        assert_eq!(store.len(), 6);
        assert_eq!(timestamps(&store), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_merge_stores() {
        let mut a = EventStore::from_events(vec![make_event(1), make_event(2)]).unwrap();
        let b = EventStore::from_events(vec![make_event(3), make_event(4)]).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(timestamps(&a), vec![1, 2, 3, 4]);

        // out of order merge is rejected without mutation
        let stale = EventStore::from_events(vec![make_event(0)]).unwrap();
        assert!(matches!(
            a.merge(&stale),
            Err(PipelineError::OrderingViolation { .. })
        ));
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_merge_associativity_on_data() {
        let a = EventStore::from_events(vec![make_event(1), make_event(2)]).unwrap();
        let b = EventStore::from_events(vec![make_event(3)]).unwrap();
        let c = EventStore::from_events(vec![make_event(4), make_event(5)]).unwrap();

        let mut left = a.clone();
        left.merge(&b).unwrap();
        left.merge(&c).unwrap();

        let mut bc = b.clone();
        bc.merge(&c).unwrap();
        let mut right = a.clone();
        right.merge(&bc).unwrap();

        assert_eq!(timestamps(&left), timestamps(&right));
    }

    #[test]
    fn test_merge_copies_into_last_shard_when_possible() {
        let mut a = EventStore::new();
        a.set_shard_capacity(10);
        a.push(make_event(1)).unwrap();

        let b = EventStore::from_events(vec![make_event(2), make_event(3)]).unwrap();
        a.merge(&b).unwrap();
        // fits in the first shard's spare capacity
        assert_eq!(a.shard_count(), 1);
        assert_eq!(timestamps(&a), vec![1, 2, 3]);
    }

    #[test]
    fn test_erase_middle() {
        let mut store = three_shard_store();
        store.erase(1, 3).unwrap();
        assert_eq!(timestamps(&store), vec![1, 5, 6]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_erase_splits_single_shard() {
        let mut store = EventStore::from_events((1..=6).map(make_event).collect()).unwrap();
        assert_eq!(store.shard_count(), 1);

        store.erase(2, 2).unwrap();
        assert_eq!(timestamps(&store), vec![1, 2, 5, 6]);
        // interior erase split the shard into two windows
        assert_eq!(store.shard_count(), 2);
    }

    #[test]
    fn test_erase_bounds_checked() {
        let mut store = three_shard_store();
        assert!(store.erase(7, 0).is_err());
        assert!(store.erase(4, 3).is_err());
        store.erase(6, 0).unwrap();
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_erase_does_not_affect_shared_slices() {
        let mut store = three_shard_store();
        let slice = store.slice(0, 6).unwrap();
        store.erase(0, 4).unwrap();
        assert_eq!(timestamps(&store), vec![5, 6]);
        assert_eq!(slice.len(), 6);
    }

    #[test]
    fn test_erase_time() {
        let mut store = three_shard_store();
        let erased = store.erase_time(2, 5).unwrap();
        assert_eq!(erased, 3);
        assert_eq!(timestamps(&store), vec![1, 5, 6]);

        // end time is exclusive even inside a shard
        assert_eq!(store.erase_time(5, 6).unwrap(), 1);
        assert_eq!(timestamps(&store), vec![1, 6]);

        assert!(store.erase_time(5, 2).is_err());
        assert_eq!(store.erase_time(100, 200).unwrap(), 0);
    }

    #[test]
    fn test_retain_duration_is_lower_bound() {
        let mut store = three_shard_store();
        store.retain_duration(1);
        // whole-shard granularity keeps one shard below the cut
        assert_eq!(timestamps(&store), vec![3, 4, 5, 6]);

        let mut store = three_shard_store();
        store.retain_duration(100);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_indexed_access() {
        let store = three_shard_store();
        assert_eq!(store[3].timestamp, 4);
        assert_eq!(store.at(5).unwrap().timestamp, 6);
        assert!(store.at(6).is_err());
        assert!(store.get(6).is_none());
    }

    #[test]
    fn test_index_at_time() {
        let store = three_shard_store();
        assert_eq!(store.index_at_time(0), 0);
        assert_eq!(store.index_at_time(3), 2);
        assert_eq!(store.index_at_time(4), 3);
        assert_eq!(store.index_at_time(7), 6);
    }

    #[test]
    #[should_panic(expected = "exceeds EventStore range")]
    fn test_index_panics_past_end() {
        let store = three_shard_store();
        let _ = store[6];
    }

    #[test]
    fn test_iterator_both_directions() {
        let store = three_shard_store();
        let forward: Vec<_> = store.iter().map(|e| e.timestamp).collect();
        assert_eq!(forward, vec![1, 2, 3, 4, 5, 6]);

        let backward: Vec<_> = store.iter().rev().map(|e| e.timestamp).collect();
        assert_eq!(backward, vec![6, 5, 4, 3, 2, 1]);

        let mut iter = store.iter();
        assert_eq!(iter.next().unwrap().timestamp, 1);
        assert_eq!(iter.next_back().unwrap().timestamp, 6);
        assert_eq!(iter.len(), 4);
    }

    #[test]
    fn test_slice_rate() {
        // 11 events over 1 second -> rate 11/s
        let mut store = EventStore::new();
        for i in 0..=10 {
            store.push(make_event(i * 100_000)).unwrap();
        }
        assert!((store.rate() - 11.0).abs() < 1e-9);

        let sliced = store.slice_rate(5.0).unwrap();
        assert_eq!(sliced.len(), 5);
        assert_eq!(sliced.highest_time(), store.highest_time());

        assert_eq!(store.slice_rate(50.0).unwrap().len(), store.len());
        assert!(store.slice_rate(0.0).is_err());
    }

    #[test]
    fn test_from_events_validates_order() {
        let err = EventStore::from_events(vec![make_event(5), make_event(3)]).unwrap_err();
        assert!(matches!(err, PipelineError::OrderingViolation { .. }));

        assert!(EventStore::from_events(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_store_accessors() {
        let store = EventStore::new();
        assert_eq!(store.lowest_time(), 0);
        assert_eq!(store.highest_time(), 0);
        assert_eq!(store.rate(), 0.0);
        assert!(store.front().is_none());
        assert!(store.back().is_none());
    }

    #[test]
    fn test_to_vec_is_flat_copy() {
        let store = three_shard_store();
        let events = store.to_vec();
        assert_eq!(events.len(), 6);
        assert_eq!(events[2].timestamp, 3);
    }

    #[test]
    fn test_display() {
        let store = three_shard_store();
        let text = store.to_string();
        assert!(text.contains("6 events"));
        assert!(text.contains("[1; 6]"));
    }
}
