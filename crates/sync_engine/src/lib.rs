//! # Sync Engine
//!
//! Windowing and multi-stream synchronization for timestamped record
//! streams.
//!
//! Responsibilities:
//! - Generic single-stream windowing by time interval or record count
//! - Synchronizing heterogeneous streams against one main clock
//! - Gap attribution policies for count-based slicing
//! - Retention-aware buffer trimming
//!
//! ## Example
//!
//! ```
//! use contracts::Event;
//! use event_store::EventStore;
//! use sync_engine::{GapPolicy, MultiStreamSlicer};
//!
//! let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
//! slicer
//!     .every_count(2, GapPolicy::Backward, |window, data| {
//!         let events: &EventStore = data.get("events").unwrap();
//!         println!("{window}: {} events", events.len());
//!     })
//!     .unwrap();
//!
//! let mut batch = EventStore::new();
//! batch.push(Event::new(1_000, 0, 0, true)).unwrap();
//! batch.push(Event::new(2_000, 0, 0, true)).unwrap();
//! slicer.accept("events", batch).unwrap();
//! ```

mod multi;
mod series;
mod slicer;

pub use multi::{GapPolicy, MultiStreamSlicer, SlicedStreams};
pub use series::{Sliceable, StreamData, StreamPayload};
pub use slicer::{JobId, SliceCallback, StreamSlicer};

// Re-export the types the slicers are commonly used with
pub use contracts::{Frame, ImuSample, PipelineError, TimeWindow, Trigger};
pub use event_store::EventStore;
