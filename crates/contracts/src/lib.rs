//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-crate data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Uses the camera timestamp (microseconds, i64) as primary clock
//! - Every managed record sequence is non-decreasing in timestamp

mod blueprint;
mod error;
mod ports;
mod record;
mod stream_id;
mod time_window;

pub use blueprint::*;
pub use error::*;
pub use ports::*;
pub use record::*;
pub use stream_id::StreamId;
pub use time_window::TimeWindow;

/// Microsecond timestamp type used across all streams.
pub type Timestamp = i64;
