//! StreamSlicer - windowing engine over one ordered record sequence.
//!
//! Holds one growing buffer and a set of registered jobs. Every `accept`
//! merges the incoming batch and evaluates the jobs in registration order:
//! time-interval jobs fire once buffered data covers their next window,
//! count jobs fire per N unconsumed records. Data already delivered to all
//! jobs is trimmed; nothing a pending job still needs is dropped.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{PipelineError, Timestamp, TimeWindow};

use crate::series::Sliceable;

/// Handle identifying a registered slicing job. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Callback invoked with the fired window and the data sliced for it.
pub type SliceCallback<S> = Box<dyn FnMut(&TimeWindow, &S)>;

enum SliceTrigger {
    /// Fire per elapsed data-time interval, in microseconds
    EveryInterval(i64),
    /// Fire per number of buffered records
    EveryCount(usize),
}

struct SliceJob<S> {
    trigger: SliceTrigger,
    callback: SliceCallback<S>,
    /// Time jobs: start of the next window; initialized on first data
    window_start: Option<Timestamp>,
    /// Count jobs: total records consumed, counted over the whole feed
    consumed: usize,
}

pub struct StreamSlicer<S: Sliceable> {
    buffer: S,
    jobs: BTreeMap<JobId, SliceJob<S>>,
    next_job: u64,
    /// Total records ever accepted
    ingested: usize,
    /// Records trimmed off the buffer front so far
    dropped: usize,
}

impl<S: Sliceable> Default for StreamSlicer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sliceable> StreamSlicer<S> {
    pub fn new() -> Self {
        Self {
            buffer: S::default(),
            jobs: BTreeMap::new(),
            next_job: 0,
            ingested: 0,
            dropped: 0,
        }
    }

    /// Merge incoming data into the buffer and evaluate all jobs.
    ///
    /// Fails with an ordering error when the batch starts before already
    /// buffered data; the buffer is left untouched in that case.
    pub fn accept(&mut self, data: S) -> Result<(), PipelineError> {
        if data.is_empty() {
            return Ok(());
        }

        self.buffer.merge(&data)?;
        self.ingested += data.len();
        self.evaluate()
    }

    /// Register a job fired for every `interval` microseconds of data time.
    ///
    /// The first window starts at the timestamp of the first buffered record
    /// the job observes; the callback receives the exact window and the
    /// buffered slice for it, which may be empty for quiet windows.
    pub fn every_interval(
        &mut self,
        interval: i64,
        callback: SliceCallback<S>,
    ) -> Result<JobId, PipelineError> {
        if interval <= 0 {
            return Err(PipelineError::invalid_argument(
                "slicing interval must be positive",
            ));
        }

        Ok(self.register(SliceJob {
            trigger: SliceTrigger::EveryInterval(interval),
            callback,
            window_start: None,
            consumed: 0,
        }))
    }

    /// Register a job fired for every `count` records accepted from now on.
    ///
    /// The callback receives the time window spanned by exactly those
    /// records plus the slice itself; the remainder stays buffered for the
    /// next firing.
    pub fn every_count(
        &mut self,
        count: usize,
        callback: SliceCallback<S>,
    ) -> Result<JobId, PipelineError> {
        if count == 0 {
            return Err(PipelineError::invalid_argument(
                "slicing record count must be positive",
            ));
        }

        Ok(self.register(SliceJob {
            trigger: SliceTrigger::EveryCount(count),
            callback,
            window_start: None,
            consumed: self.ingested,
        }))
    }

    fn register(&mut self, job: SliceJob<S>) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        self.jobs.insert(id, job);
        id
    }

    /// True if the slicer holds a job with the given id.
    pub fn has_job(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Remove a job by handle. Unknown handles are ignored.
    pub fn remove_job(&mut self, id: JobId) {
        self.jobs.remove(&id);
    }

    /// Change the interval of a time-based job.
    ///
    /// Fails when the job slices by record count. Unknown handles are
    /// ignored.
    pub fn modify_time_interval(
        &mut self,
        id: JobId,
        interval: i64,
    ) -> Result<(), PipelineError> {
        if interval <= 0 {
            return Err(PipelineError::invalid_argument(
                "slicing interval must be positive",
            ));
        }

        match self.jobs.get_mut(&id) {
            Some(job) => match job.trigger {
                SliceTrigger::EveryInterval(_) => {
                    job.trigger = SliceTrigger::EveryInterval(interval);
                    Ok(())
                }
                SliceTrigger::EveryCount(_) => Err(PipelineError::invalid_argument(
                    "cannot modify the time interval of a count-based job",
                )),
            },
            None => Ok(()),
        }
    }

    /// Change the record count of a count-based job.
    ///
    /// Fails when the job slices by time. Unknown handles are ignored.
    pub fn modify_count(&mut self, id: JobId, count: usize) -> Result<(), PipelineError> {
        if count == 0 {
            return Err(PipelineError::invalid_argument(
                "slicing record count must be positive",
            ));
        }

        match self.jobs.get_mut(&id) {
            Some(job) => match job.trigger {
                SliceTrigger::EveryCount(_) => {
                    job.trigger = SliceTrigger::EveryCount(count);
                    Ok(())
                }
                SliceTrigger::EveryInterval(_) => Err(PipelineError::invalid_argument(
                    "cannot modify the record count of a time-based job",
                )),
            },
            None => Ok(()),
        }
    }

    /// Largest interval across the live time-based jobs.
    pub fn max_interval(&self) -> Option<i64> {
        self.jobs
            .values()
            .filter_map(|job| match job.trigger {
                SliceTrigger::EveryInterval(interval) => Some(interval),
                SliceTrigger::EveryCount(_) => None,
            })
            .max()
    }

    /// Largest record count across the live count-based jobs.
    pub fn max_count(&self) -> Option<usize> {
        self.jobs
            .values()
            .filter_map(|job| match job.trigger {
                SliceTrigger::EveryCount(count) => Some(count),
                SliceTrigger::EveryInterval(_) => None,
            })
            .max()
    }

    /// Records currently buffered, for diagnostics.
    pub fn buffered(&self) -> &S {
        &self.buffer
    }

    fn evaluate(&mut self) -> Result<(), PipelineError> {
        for job in self.jobs.values_mut() {
            match job.trigger {
                SliceTrigger::EveryInterval(interval) => {
                    if job.window_start.is_none() {
                        if self.buffer.is_empty() {
                            continue;
                        }
                        job.window_start = Some(self.buffer.lowest_time());
                    }

                    // window_start just initialized above
                    let mut window_start = job.window_start.unwrap_or_default();
                    while self.buffer.highest_time() >= window_start + interval {
                        let end = window_start + interval;
                        let slice = self.buffer.slice_time(window_start, end);
                        (job.callback)(&TimeWindow::new(window_start, end), &slice);
                        window_start = end;
                    }
                    job.window_start = Some(window_start);
                }
                SliceTrigger::EveryCount(count) => {
                    while self.ingested - job.consumed >= count {
                        let start_index = job.consumed - self.dropped;
                        let slice = self.buffer.slice_range(start_index, count)?;
                        let window =
                            TimeWindow::new(slice.lowest_time(), slice.highest_time());
                        (job.callback)(&window, &slice);
                        job.consumed += count;
                    }
                }
            }
        }

        self.trim();
        Ok(())
    }

    /// Drop the buffer prefix no pending job needs anymore.
    fn trim(&mut self) {
        let mut keep_from = self.buffer.len();
        for job in self.jobs.values() {
            let needed = match job.trigger {
                SliceTrigger::EveryInterval(_) => match job.window_start {
                    Some(start) => self.buffer.index_at_time(start),
                    None => 0,
                },
                SliceTrigger::EveryCount(_) => job.consumed - self.dropped,
            };
            keep_from = keep_from.min(needed);
        }

        if keep_from > 0 {
            self.buffer.erase_front(keep_from);
            self.dropped += keep_from;
        }
    }
}
