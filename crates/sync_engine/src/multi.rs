//! MultiStreamSlicer - drives several heterogeneous streams off one clock.
//!
//! One named main stream feeds a [`StreamSlicer`]; every other registered
//! stream is passively synchronized to it. Evaluation never progresses past
//! the least-advanced stream, so a callback always sees complete data for
//! its window. Streams that stay quiet for a while are advanced manually
//! through their seek timestamp.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use contracts::{PipelineError, Record, StreamId, Timestamp, TimeWindow};
use tracing::instrument;

use crate::series::{StreamData, StreamPayload};
use crate::slicer::{JobId, StreamSlicer};

/// Attribution rule for secondary-stream data falling between two
/// count-based main-stream slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapPolicy {
    /// Assign gap records between the previous slice and the current one to
    /// the current callback. No extra delay.
    #[default]
    Backward,
    /// Assign gap records between the current slice and the next one to the
    /// current callback, delaying every delivery by exactly one firing.
    Forward,
}

/// Map of stream name to the data sliced for one callback firing.
#[derive(Debug, Clone, Default)]
pub struct SlicedStreams {
    inner: HashMap<StreamId, StreamData>,
}

impl SlicedStreams {
    fn insert(&mut self, name: StreamId, data: StreamData) {
        self.inner.insert(name, data);
    }

    /// Typed access to one stream's slice.
    pub fn get<T: StreamPayload>(&self, name: &str) -> Result<&T, PipelineError> {
        let data = self
            .inner
            .get(name)
            .ok_or_else(|| PipelineError::unknown_stream(name))?;
        T::from_data(data).ok_or_else(|| {
            PipelineError::type_mismatch(name, T::KIND.to_string(), data.kind().to_string())
        })
    }

    /// Untyped access to one stream's slice.
    pub fn raw(&self, name: &str) -> Option<&StreamData> {
        self.inner.get(name)
    }

    /// Iterate over all delivered slices.
    pub fn iter(&self) -> impl Iterator<Item = (&StreamId, &StreamData)> {
        self.inner.iter()
    }

    /// Number of delivered streams.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no stream was delivered.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// State shared between the slicer and its registered job closures.
struct SharedState {
    /// Live, growing buffer per named stream
    buffers: RefCell<HashMap<StreamId, StreamData>>,
    /// Manually provided seek timestamp per stream; -1 = unset
    seeks: RefCell<HashMap<StreamId, Timestamp>>,
    /// End of the last fired time window; -1 until the first firing
    seek_time: Cell<Timestamp>,
    /// Largest interval across time jobs; -1 while none exist
    retain_duration: Cell<i64>,
    /// Largest record count across count jobs
    retain_count: Cell<usize>,
}

enum JobSpec {
    Interval(i64),
    Count(usize),
}

pub struct MultiStreamSlicer<M: StreamPayload> {
    main_stream: StreamId,
    /// Slicer for the main stream; all other streams follow it
    main_slicer: StreamSlicer<M>,
    state: Rc<SharedState>,
    /// Configured jobs, for modification and retention bookkeeping
    specs: BTreeMap<JobId, JobSpec>,
    /// Timestamp limit the main slicer has been fed up to; -1 initially
    main_seek: Timestamp,
}

impl<M: StreamPayload + 'static> MultiStreamSlicer<M> {
    /// Create a slicer driven by the named main stream of type `M`.
    pub fn new(main_stream: impl Into<StreamId>) -> Self {
        let main_stream = main_stream.into();
        let mut buffers = HashMap::new();
        buffers.insert(main_stream.clone(), M::default().into_data());
        let mut seeks = HashMap::new();
        seeks.insert(main_stream.clone(), -1);

        Self {
            main_stream,
            main_slicer: StreamSlicer::new(),
            state: Rc::new(SharedState {
                buffers: RefCell::new(buffers),
                seeks: RefCell::new(seeks),
                seek_time: Cell::new(-1),
                retain_duration: Cell::new(-1),
                retain_count: Cell::new(0),
            }),
            specs: BTreeMap::new(),
            main_seek: -1,
        }
    }

    /// Register a secondary stream of sequence type `T`.
    pub fn add_stream<T: StreamPayload>(
        &mut self,
        name: impl Into<StreamId>,
    ) -> Result<(), PipelineError> {
        let name = name.into();
        let mut buffers = self.state.buffers.borrow_mut();
        if buffers.contains_key(&name) {
            return Err(PipelineError::invalid_argument(format!(
                "stream '{name}' is already registered"
            )));
        }

        buffers.insert(name.clone(), T::default().into_data());
        self.state.seeks.borrow_mut().insert(name, -1);
        Ok(())
    }

    /// Accept a batch of data for a stream and evaluate pending jobs.
    ///
    /// The batch kind must match the stream's registered type and must not
    /// start before data already buffered for that stream.
    #[instrument(
        level = "trace",
        name = "multi_slicer_accept",
        skip(self, data),
        fields(stream = %name)
    )]
    pub fn accept(
        &mut self,
        name: &str,
        data: impl Into<StreamData>,
    ) -> Result<(), PipelineError> {
        let data = data.into();
        metrics::counter!(
            "evsync_batches_received_total",
            "stream" => name.to_string(),
            "kind" => data.kind().to_string()
        )
        .increment(1);

        {
            let mut buffers = self.state.buffers.borrow_mut();
            let buffer = buffers
                .get_mut(name)
                .ok_or_else(|| PipelineError::unknown_stream(name))?;
            buffer.merge(&data).map_err(|error| match error {
                PipelineError::TypeMismatch {
                    expected, actual, ..
                } => PipelineError::type_mismatch(name, expected, actual),
                other => other,
            })?;
        }

        self.evaluate()
    }

    /// Accept a single timestamped record for a stream.
    #[instrument(
        level = "trace",
        name = "multi_slicer_accept_record",
        skip(self, record),
        fields(stream = %name)
    )]
    pub fn accept_record(
        &mut self,
        name: &str,
        record: impl Into<Record>,
    ) -> Result<(), PipelineError> {
        let record = record.into();

        {
            let mut buffers = self.state.buffers.borrow_mut();
            let buffer = buffers
                .get_mut(name)
                .ok_or_else(|| PipelineError::unknown_stream(name))?;
            buffer.push_record(&record).map_err(|error| match error {
                PipelineError::TypeMismatch {
                    expected, actual, ..
                } => PipelineError::type_mismatch(name, expected, actual),
                other => other,
            })?;
        }

        self.evaluate()
    }

    /// Manually advance a stream's progress marker and evaluate.
    ///
    /// Tells the slicer that the stream has provided everything up to, but
    /// not including, `seek_timestamp`, even when no data arrived. Use for
    /// aperiodic streams that would otherwise stall evaluation; data arriving
    /// later but before the seek time is lost to slicing.
    pub fn set_stream_seek_time(
        &mut self,
        name: &str,
        seek_timestamp: Timestamp,
    ) -> Result<(), PipelineError> {
        {
            let mut seeks = self.state.seeks.borrow_mut();
            let seek = seeks
                .get_mut(name)
                .ok_or_else(|| PipelineError::unknown_stream(name))?;
            *seek = seek_timestamp;
        }
        self.evaluate()
    }

    /// Register a callback fired for every `interval` microseconds of main
    /// stream data time. The callback receives the window plus the aligned
    /// slice of every registered stream.
    pub fn every_interval(
        &mut self,
        interval: i64,
        callback: impl FnMut(&TimeWindow, &SlicedStreams) + 'static,
    ) -> Result<JobId, PipelineError> {
        let state = Rc::clone(&self.state);
        let main_name = self.main_stream.clone();
        let mut callback = callback;

        let inner = move |window: &TimeWindow, packet: &M| {
            let data = collect_streams(&state, &main_name, packet, window.start, window.end);
            callback(window, &data);
            state.seek_time.set(window.end);
        };

        let id = self.main_slicer.every_interval(interval, Box::new(inner))?;
        self.specs.insert(id, JobSpec::Interval(interval));
        if interval > self.state.retain_duration.get() {
            self.state.retain_duration.set(interval);
        }
        Ok(id)
    }

    /// Register a callback fired for every `count` main-stream records, with
    /// the given gap-attribution policy for secondary streams.
    pub fn every_count(
        &mut self,
        count: usize,
        policy: GapPolicy,
        callback: impl FnMut(&TimeWindow, &SlicedStreams) + 'static,
    ) -> Result<JobId, PipelineError> {
        let state = Rc::clone(&self.state);
        let main_name = self.main_stream.clone();
        let mut callback = callback;

        let inner: Box<dyn FnMut(&TimeWindow, &M)> = match policy {
            GapPolicy::Backward => {
                let mut last_time: Timestamp = -1;
                Box::new(move |window: &TimeWindow, packet: &M| {
                    // gap data since the previous firing rides along
                    let data =
                        collect_streams(&state, &main_name, packet, last_time + 1, window.end + 1);
                    last_time = window.end;
                    callback(window, &data);
                })
            }
            GapPolicy::Forward => {
                let mut last_slice: Option<(M, TimeWindow)> = None;
                Box::new(move |window: &TimeWindow, packet: &M| {
                    let Some((previous, previous_window)) =
                        last_slice.replace((packet.clone(), *window))
                    else {
                        // first firing only primes the delay line
                        return;
                    };

                    let delivered = TimeWindow::new(previous_window.start, window.start);
                    let data = collect_streams(
                        &state,
                        &main_name,
                        &previous,
                        delivered.start,
                        delivered.end,
                    );
                    callback(&delivered, &data);
                })
            }
        };

        let id = self.main_slicer.every_count(count, inner)?;
        self.specs.insert(id, JobSpec::Count(count));
        if count > self.state.retain_count.get() {
            self.state.retain_count.set(count);
        }
        Ok(id)
    }

    /// True if the slicer holds a job with the given id.
    pub fn has_job(&self, id: JobId) -> bool {
        self.specs.contains_key(&id)
    }

    /// Remove a job and recompute the retention bounds.
    pub fn remove_job(&mut self, id: JobId) {
        if self.specs.remove(&id).is_some() {
            self.main_slicer.remove_job(id);
            self.recompute_retention();
        }
    }

    /// Change the interval of a time-based job. Unknown handles are ignored.
    pub fn modify_time_interval(
        &mut self,
        id: JobId,
        interval: i64,
    ) -> Result<(), PipelineError> {
        if !self.has_job(id) {
            return Ok(());
        }

        self.main_slicer.modify_time_interval(id, interval)?;
        self.specs.insert(id, JobSpec::Interval(interval));
        self.recompute_retention();
        Ok(())
    }

    /// Change the record count of a count-based job. Unknown handles are
    /// ignored.
    pub fn modify_count(&mut self, id: JobId, count: usize) -> Result<(), PipelineError> {
        if !self.has_job(id) {
            return Ok(());
        }

        self.main_slicer.modify_count(id, count)?;
        self.specs.insert(id, JobSpec::Count(count));
        self.recompute_retention();
        Ok(())
    }

    fn recompute_retention(&self) {
        let mut duration: i64 = -1;
        let mut count: usize = 0;
        for spec in self.specs.values() {
            match *spec {
                JobSpec::Interval(interval) => duration = duration.max(interval),
                JobSpec::Count(n) => count = count.max(n),
            }
        }
        self.state.retain_duration.set(duration);
        self.state.retain_count.set(count);
    }

    /// Evaluate the current state: seek to the least-advanced stream, feed
    /// the main slicer, fire ready jobs and trim consumed data.
    #[instrument(level = "trace", name = "multi_slicer_evaluate", skip(self))]
    fn evaluate(&mut self) -> Result<(), PipelineError> {
        let time_limit = {
            let buffers = self.state.buffers.borrow();
            let seeks = self.state.seeks.borrow();

            let mut min_highest = Timestamp::MAX;
            for (name, buffer) in buffers.iter() {
                if buffer.is_empty() {
                    match seeks.get(name).copied() {
                        Some(seek) if seek >= 0 => min_highest = min_highest.min(seek),
                        // an empty stream without a seek time blocks progress
                        _ => return Ok(()),
                    }
                } else {
                    min_highest = min_highest.min(buffer.highest_time());
                }
            }
            min_highest + 1
        };

        if self.main_seek == time_limit {
            return Ok(());
        }

        let main_slice = {
            let mut buffers = self.state.buffers.borrow_mut();
            let buffer = buffers
                .get_mut(&self.main_stream)
                .ok_or_else(|| PipelineError::unknown_stream(self.main_stream.clone()))?;
            let buffer_kind = buffer.kind();
            let main = M::from_data_mut(buffer).ok_or_else(|| {
                PipelineError::type_mismatch(
                    self.main_stream.clone(),
                    M::KIND.to_string(),
                    buffer_kind.to_string(),
                )
            })?;

            let slice = main.slice_time(0, time_limit);
            main.erase_up_to(time_limit, 0);
            slice
        };

        self.main_slicer.accept(main_slice)?;
        self.main_seek = time_limit;

        // trim secondary streams past what pending jobs may still request
        let retain_duration = self.state.retain_duration.get();
        let erase_limit = if retain_duration >= 0 {
            self.state.seek_time.get() - retain_duration
        } else {
            time_limit
        };
        let retain_count = self.state.retain_count.get();

        let mut buffers = self.state.buffers.borrow_mut();
        for (name, buffer) in buffers.iter_mut() {
            if name == &self.main_stream {
                continue;
            }
            buffer.erase_up_to(erase_limit, retain_count);
        }

        Ok(())
    }
}

/// Slice every registered stream for `[start, end)` and bundle it with the
/// main packet.
fn collect_streams<M: StreamPayload>(
    state: &SharedState,
    main_name: &StreamId,
    packet: &M,
    start: Timestamp,
    end: Timestamp,
) -> SlicedStreams {
    let mut data = SlicedStreams::default();
    data.insert(main_name.clone(), packet.clone().into_data());

    let buffers = state.buffers.borrow();
    for (name, buffer) in buffers.iter() {
        if name == main_name {
            continue;
        }
        data.insert(name.clone(), buffer.slice_time(start, end));
    }

    data
}
