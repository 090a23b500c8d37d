//! Record-sequence abstraction and the tagged stream-data union.
//!
//! The slicing engines operate on anything that behaves like an ordered,
//! timestamped sequence: the sharded [`EventStore`] or a plain vector of
//! frames, inertial samples or triggers. [`Sliceable`] captures that
//! behavior; [`StreamData`] closes the set of supported sequence kinds into
//! one variant type with a single dispatch point per operation.

use contracts::{
    Frame, ImuSample, PipelineError, Record, StreamKind, Timestamp, TimeWindow, Timestamped,
    Trigger,
};
use event_store::EventStore;

/// An ordered, timestamped record sequence the slicers can drive.
///
/// Timestamps are non-decreasing across the sequence; merges violating that
/// are rejected, never silently reordered.
pub trait Sliceable: Default + Clone {
    /// Number of records.
    fn len(&self) -> usize;

    /// True when the sequence holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the first record. 0 when empty.
    fn lowest_time(&self) -> Timestamp;

    /// Timestamp of the last record. 0 when empty.
    fn highest_time(&self) -> Timestamp;

    /// Copy or share the records in the half-open range `[start, end)`.
    fn slice_time(&self, start: Timestamp, end: Timestamp) -> Self;

    /// Copy or share `length` records starting at index `start`.
    fn slice_range(&self, start: usize, length: usize) -> Result<Self, PipelineError>;

    /// Index of the first record with a timestamp at or after `time`.
    fn index_at_time(&self, time: Timestamp) -> usize;

    /// Append another sequence behind this one, rejecting ordering breaks.
    fn merge(&mut self, other: &Self) -> Result<(), PipelineError>;

    /// Drop `count` records off the front.
    fn erase_front(&mut self, count: usize);

    /// Drop records older than `time_limit` while keeping at least
    /// `min_retained` records buffered.
    fn erase_up_to(&mut self, time_limit: Timestamp, min_retained: usize);
}

impl Sliceable for EventStore {
    fn len(&self) -> usize {
        EventStore::len(self)
    }

    fn lowest_time(&self) -> Timestamp {
        EventStore::lowest_time(self)
    }

    fn highest_time(&self) -> Timestamp {
        EventStore::highest_time(self)
    }

    fn slice_time(&self, start: Timestamp, end: Timestamp) -> Self {
        EventStore::slice_time(self, start, end)
    }

    fn slice_range(&self, start: usize, length: usize) -> Result<Self, PipelineError> {
        self.slice(start, length)
    }

    fn index_at_time(&self, time: Timestamp) -> usize {
        EventStore::index_at_time(self, time)
    }

    fn merge(&mut self, other: &Self) -> Result<(), PipelineError> {
        EventStore::merge(self, other)
    }

    fn erase_front(&mut self, count: usize) {
        *self = self.slice_from(count);
    }

    fn erase_up_to(&mut self, time_limit: Timestamp, min_retained: usize) {
        let sliced = self.slice_time(time_limit, self.highest_time() + 1);
        if min_retained == 0 || sliced.len() >= min_retained {
            *self = sliced;
        } else {
            let by_size = self.slice_back(min_retained);
            if by_size.lowest_time() < time_limit {
                *self = by_size;
            }
        }
    }
}

impl<T: Timestamped + Clone> Sliceable for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn lowest_time(&self) -> Timestamp {
        self.first().map_or(0, Timestamped::timestamp)
    }

    fn highest_time(&self) -> Timestamp {
        self.last().map_or(0, Timestamped::timestamp)
    }

    fn slice_time(&self, start: Timestamp, end: Timestamp) -> Self {
        let lower = self.partition_point(|r| r.timestamp() < start);
        let upper = lower + self[lower..].partition_point(|r| r.timestamp() < end);
        self[lower..upper].to_vec()
    }

    fn slice_range(&self, start: usize, length: usize) -> Result<Self, PipelineError> {
        if start + length > self.len() {
            return Err(PipelineError::out_of_range("slice exceeds sequence range"));
        }
        Ok(self[start..start + length].to_vec())
    }

    fn index_at_time(&self, time: Timestamp) -> usize {
        self.partition_point(|r| r.timestamp() < time)
    }

    fn merge(&mut self, other: &Self) -> Result<(), PipelineError> {
        if let (Some(last), Some(first)) = (self.last(), other.first()) {
            if first.timestamp() < last.timestamp() {
                return Err(PipelineError::ordering(
                    last.timestamp(),
                    first.timestamp(),
                ));
            }
        }
        self.extend_from_slice(other);
        Ok(())
    }

    fn erase_front(&mut self, count: usize) {
        self.drain(..count.min(self.len()));
    }

    fn erase_up_to(&mut self, time_limit: Timestamp, min_retained: usize) {
        if self.is_empty() {
            return;
        }

        let lower = self.partition_point(|r| r.timestamp() < time_limit);
        if min_retained == 0 || self.len() - lower >= min_retained {
            self.drain(..lower);
            return;
        }

        // keep the size bound even if it reaches past the time limit
        let Some(size_bound) = self.len().checked_sub(min_retained + 1) else {
            return;
        };
        if self[size_bound].timestamp() < time_limit {
            self.drain(..size_bound);
        }
    }
}

/// One buffered record sequence of any supported stream kind.
///
/// Closed union over the sequence types the multi-stream slicer can carry;
/// every operation dispatches over the variants exactly once.
#[derive(Debug, Clone)]
pub enum StreamData {
    Events(EventStore),
    Frames(Vec<Frame>),
    Imu(Vec<ImuSample>),
    Triggers(Vec<Trigger>),
}

impl StreamData {
    /// Kind of records this sequence carries.
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamData::Events(_) => StreamKind::Events,
            StreamData::Frames(_) => StreamKind::Frames,
            StreamData::Imu(_) => StreamKind::Imu,
            StreamData::Triggers(_) => StreamKind::Triggers,
        }
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        match self {
            StreamData::Events(s) => s.len(),
            StreamData::Frames(v) => v.len(),
            StreamData::Imu(v) => v.len(),
            StreamData::Triggers(v) => v.len(),
        }
    }

    /// True when no records are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the last buffered record. 0 when empty.
    pub fn highest_time(&self) -> Timestamp {
        match self {
            StreamData::Events(s) => Sliceable::highest_time(s),
            StreamData::Frames(v) => Sliceable::highest_time(v),
            StreamData::Imu(v) => Sliceable::highest_time(v),
            StreamData::Triggers(v) => Sliceable::highest_time(v),
        }
    }

    /// Time span of the buffered records.
    pub fn time_window(&self) -> TimeWindow {
        match self {
            StreamData::Events(s) => TimeWindow::new(s.lowest_time(), Sliceable::highest_time(s)),
            StreamData::Frames(v) => TimeWindow::new(v.lowest_time(), Sliceable::highest_time(v)),
            StreamData::Imu(v) => TimeWindow::new(v.lowest_time(), Sliceable::highest_time(v)),
            StreamData::Triggers(v) => TimeWindow::new(v.lowest_time(), Sliceable::highest_time(v)),
        }
    }

    /// Records in the half-open time range `[start, end)`, as the same kind.
    pub fn slice_time(&self, start: Timestamp, end: Timestamp) -> StreamData {
        match self {
            StreamData::Events(s) => StreamData::Events(Sliceable::slice_time(s, start, end)),
            StreamData::Frames(v) => StreamData::Frames(Sliceable::slice_time(v, start, end)),
            StreamData::Imu(v) => StreamData::Imu(Sliceable::slice_time(v, start, end)),
            StreamData::Triggers(v) => StreamData::Triggers(Sliceable::slice_time(v, start, end)),
        }
    }

    /// Merge another batch of the same kind behind the buffered records.
    ///
    /// A kind mismatch is a reportable error; the caller adds the stream
    /// name for context.
    pub fn merge(&mut self, other: &StreamData) -> Result<(), PipelineError> {
        match (self, other) {
            (StreamData::Events(s), StreamData::Events(o)) => Sliceable::merge(s, o),
            (StreamData::Frames(v), StreamData::Frames(o)) => Sliceable::merge(v, o),
            (StreamData::Imu(v), StreamData::Imu(o)) => Sliceable::merge(v, o),
            (StreamData::Triggers(v), StreamData::Triggers(o)) => Sliceable::merge(v, o),
            (current, other) => Err(PipelineError::type_mismatch(
                "",
                current.kind().to_string(),
                other.kind().to_string(),
            )),
        }
    }

    /// Append a single record of the matching kind.
    pub fn push_record(&mut self, record: &Record) -> Result<(), PipelineError> {
        fn push_ordered<T: Timestamped + Clone>(
            buffer: &mut Vec<T>,
            record: &T,
        ) -> Result<(), PipelineError> {
            if let Some(last) = buffer.last() {
                if record.timestamp() < last.timestamp() {
                    return Err(PipelineError::ordering(
                        last.timestamp(),
                        record.timestamp(),
                    ));
                }
            }
            buffer.push(record.clone());
            Ok(())
        }

        match (self, record) {
            (StreamData::Events(s), Record::Event(e)) => s.push(*e),
            (StreamData::Frames(v), Record::Frame(f)) => push_ordered(v, f),
            (StreamData::Imu(v), Record::Imu(s)) => push_ordered(v, s),
            (StreamData::Triggers(v), Record::Trigger(t)) => push_ordered(v, t),
            (current, record) => Err(PipelineError::type_mismatch(
                "",
                current.kind().to_string(),
                record.kind().to_string(),
            )),
        }
    }

    /// Drop records older than `time_limit` while keeping `min_retained`.
    pub fn erase_up_to(&mut self, time_limit: Timestamp, min_retained: usize) {
        match self {
            StreamData::Events(s) => Sliceable::erase_up_to(s, time_limit, min_retained),
            StreamData::Frames(v) => Sliceable::erase_up_to(v, time_limit, min_retained),
            StreamData::Imu(v) => Sliceable::erase_up_to(v, time_limit, min_retained),
            StreamData::Triggers(v) => Sliceable::erase_up_to(v, time_limit, min_retained),
        }
    }
}

impl From<EventStore> for StreamData {
    fn from(value: EventStore) -> Self {
        StreamData::Events(value)
    }
}

impl From<Vec<Frame>> for StreamData {
    fn from(value: Vec<Frame>) -> Self {
        StreamData::Frames(value)
    }
}

impl From<Vec<ImuSample>> for StreamData {
    fn from(value: Vec<ImuSample>) -> Self {
        StreamData::Imu(value)
    }
}

impl From<Vec<Trigger>> for StreamData {
    fn from(value: Vec<Trigger>) -> Self {
        StreamData::Triggers(value)
    }
}

/// Links a concrete sequence type to its [`StreamData`] variant.
///
/// Powers typed stream registration and the typed getters on the data map
/// handed to slicing callbacks.
pub trait StreamPayload: Sliceable {
    /// Variant this payload type lives in.
    const KIND: StreamKind;

    /// Wrap the payload into its variant.
    fn into_data(self) -> StreamData;

    /// Borrow the payload out of a matching variant.
    fn from_data(data: &StreamData) -> Option<&Self>;

    /// Mutably borrow the payload out of a matching variant.
    fn from_data_mut(data: &mut StreamData) -> Option<&mut Self>;
}

impl StreamPayload for EventStore {
    const KIND: StreamKind = StreamKind::Events;

    fn into_data(self) -> StreamData {
        StreamData::Events(self)
    }

    fn from_data(data: &StreamData) -> Option<&Self> {
        match data {
            StreamData::Events(s) => Some(s),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut StreamData) -> Option<&mut Self> {
        match data {
            StreamData::Events(s) => Some(s),
            _ => None,
        }
    }
}

impl StreamPayload for Vec<Frame> {
    const KIND: StreamKind = StreamKind::Frames;

    fn into_data(self) -> StreamData {
        StreamData::Frames(self)
    }

    fn from_data(data: &StreamData) -> Option<&Self> {
        match data {
            StreamData::Frames(v) => Some(v),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut StreamData) -> Option<&mut Self> {
        match data {
            StreamData::Frames(v) => Some(v),
            _ => None,
        }
    }
}

impl StreamPayload for Vec<ImuSample> {
    const KIND: StreamKind = StreamKind::Imu;

    fn into_data(self) -> StreamData {
        StreamData::Imu(self)
    }

    fn from_data(data: &StreamData) -> Option<&Self> {
        match data {
            StreamData::Imu(v) => Some(v),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut StreamData) -> Option<&mut Self> {
        match data {
            StreamData::Imu(v) => Some(v),
            _ => None,
        }
    }
}

impl StreamPayload for Vec<Trigger> {
    const KIND: StreamKind = StreamKind::Triggers;

    fn into_data(self) -> StreamData {
        StreamData::Triggers(self)
    }

    fn from_data(data: &StreamData) -> Option<&Self> {
        match data {
            StreamData::Triggers(v) => Some(v),
            _ => None,
        }
    }

    fn from_data_mut(data: &mut StreamData) -> Option<&mut Self> {
        match data {
            StreamData::Triggers(v) => Some(v),
            _ => None,
        }
    }
}
