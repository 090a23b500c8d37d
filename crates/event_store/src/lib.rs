//! # Event Store
//!
//! Sharded, time-ordered, in-memory storage for event-camera data.
//!
//! Responsibilities:
//! - Buffer high-rate event streams in capacity-bounded shards
//! - O(log n) slicing by index and by time, without copying payloads
//! - Merge, erase and retention with strict ordering guarantees
//! - Dense-array export for numeric post-processing
//!
//! ## Example
//!
//! ```
//! use contracts::Event;
//! use event_store::EventStore;
//!
//! let mut store = EventStore::new();
//! store.push(Event::new(1_000, 10, 20, true)).unwrap();
//! store.push(Event::new(2_000, 11, 20, false)).unwrap();
//!
//! let window = store.slice_time(1_000, 2_000);
//! assert_eq!(window.len(), 1);
//! ```

mod arrays;
mod shard;
mod store;

pub use arrays::EventArrays;
pub use store::{EventStore, Iter, DEFAULT_SHARD_CAPACITY};
