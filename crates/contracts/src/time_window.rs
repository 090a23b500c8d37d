//! TimeWindow - half-open time interval handed to slicing callbacks.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Half-open time interval `[start, end)` in microseconds.
///
/// Every slicing callback receives the window the delivered data was carved
/// from, so downstream code can distinguish "no records" from "no window".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start (inclusive)
    pub start: Timestamp,

    /// Window end (exclusive)
    pub end: Timestamp,
}

impl TimeWindow {
    /// Create a new window.
    #[inline]
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Window length in microseconds. Zero for inverted windows.
    #[inline]
    pub fn duration(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    /// True if `timestamp` falls inside the window.
    #[inline]
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}; {})", self.start, self.end)
    }
}
