//! Port traits - producer and consumer abstraction
//!
//! Defines the unified interface between the storage/synchronization core and
//! its collaborators (device drivers, file readers, downstream processors).
//! The core never assumes anything about how these are implemented.

use std::sync::Arc;

use crate::{PipelineError, StreamKind, TimeWindow};

/// Batch delivery callback type
///
/// When a source produces a batch of records it hands the batch through this
/// callback. The batch is immutable from the core's point of view; the core
/// only retains it through shared ownership. Uses `Arc` to allow callback
/// sharing across multiple contexts.
pub type BatchCallback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Producer port: a source of timestamped record batches.
///
/// Abstracts camera drivers, file readers and replay tools behind one
/// interface. `T` is the batch type of the stream (e.g. a vector of frames);
/// batches arrive in non-decreasing time order.
pub trait BatchSource<T>: Send + Sync {
    /// Name of the stream this source feeds
    fn stream_name(&self) -> &str;

    /// Kind of records the source produces
    fn kind(&self) -> StreamKind;

    /// Register the delivery callback
    ///
    /// If already listening, repeated calls should be idempotent (won't
    /// register multiple callbacks).
    fn listen(&self, callback: BatchCallback<T>);

    /// Stop producing data
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}

/// Consumer port: commits sliced windows downstream.
///
/// The core hands over a freshly-allocated, owned batch per window; once
/// committed, the core must not be assumed to still own it.
pub trait WindowSink<T> {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Commit one sliced window
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn commit(&mut self, window: &TimeWindow, data: T) -> Result<(), PipelineError>;

    /// Flush buffer (if any)
    fn flush(&mut self) -> Result<(), PipelineError>;

    /// Close sink
    fn close(&mut self) -> Result<(), PipelineError>;
}
