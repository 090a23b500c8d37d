//! Slicing metrics collection.
//!
//! Records the operational metrics of the storage and synchronization
//! engine, plus an in-memory aggregator for summary reports.

use std::collections::HashMap;

use contracts::TimeWindow;
use metrics::{counter, gauge, histogram};

/// Record one received batch for a stream.
pub fn record_batch_received(stream: &str, kind: &str, record_count: usize) {
    counter!(
        "evsync_batches_received_total",
        "stream" => stream.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
    counter!(
        "evsync_records_received_total",
        "stream" => stream.to_string()
    )
    .increment(record_count as u64);
}

/// Record one fired slicing window.
///
/// Call for every callback invocation of a slicer job.
pub fn record_window_fired(job_kind: &str, window: &TimeWindow, main_records: usize) {
    counter!(
        "evsync_windows_fired_total",
        "job_kind" => job_kind.to_string()
    )
    .increment(1);
    histogram!("evsync_window_duration_us").record(window.duration() as f64);
    histogram!("evsync_window_records").record(main_records as f64);
}

/// Record the buffered depth of a stream.
pub fn record_buffer_depth(stream: &str, depth: usize) {
    gauge!(
        "evsync_buffer_depth",
        "stream" => stream.to_string()
    )
    .set(depth as f64);
}

/// Record records dropped by a retention trim.
pub fn record_retention_trim(stream: &str, trimmed: usize) {
    if trimmed > 0 {
        counter!(
            "evsync_records_trimmed_total",
            "stream" => stream.to_string()
        )
        .increment(trimmed as u64);
    }
}

/// Record a rejected out-of-order append or merge.
pub fn record_ordering_violation(stream: &str) {
    counter!(
        "evsync_ordering_violations_total",
        "stream" => stream.to_string()
    )
    .increment(1);
}

/// Window metrics aggregator.
///
/// Aggregates firing statistics in memory for summary output.
#[derive(Debug, Clone, Default)]
pub struct WindowMetricsAggregator {
    /// Total fired windows
    pub total_windows: u64,

    /// Windows delivered without any records
    pub empty_windows: u64,

    /// Window duration statistics (microseconds)
    pub duration_stats: RunningStats,

    /// Main-stream record count statistics per window
    pub record_stats: RunningStats,

    /// Per-stream delivered record totals
    pub stream_records: HashMap<String, u64>,
}

impl WindowMetricsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics with one fired window.
    pub fn update(&mut self, window: &TimeWindow, records_per_stream: &HashMap<String, usize>) {
        self.total_windows += 1;
        self.duration_stats.push(window.duration() as f64);

        let total: usize = records_per_stream.values().sum();
        if total == 0 {
            self.empty_windows += 1;
        }
        self.record_stats.push(total as f64);

        for (stream, count) in records_per_stream {
            *self.stream_records.entry(stream.clone()).or_insert(0) += *count as u64;
        }
    }

    /// Produce a summary report.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_windows: self.total_windows,
            empty_windows: self.empty_windows,
            empty_rate: if self.total_windows > 0 {
                self.empty_windows as f64 / self.total_windows as f64 * 100.0
            } else {
                0.0
            },
            window_duration_us: StatsSummary::from(&self.duration_stats),
            records_per_window: StatsSummary::from(&self.record_stats),
            stream_records: self.stream_records.clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_windows: u64,
    pub empty_windows: u64,
    pub empty_rate: f64,
    pub window_duration_us: StatsSummary,
    pub records_per_window: StatsSummary,
    pub stream_records: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Slicing Metrics Summary ===")?;
        writeln!(f, "Total windows: {}", self.total_windows)?;
        writeln!(
            f,
            "Empty windows: {} ({:.2}%)",
            self.empty_windows, self.empty_rate
        )?;
        writeln!(f, "Window duration (us): {}", self.window_duration_us)?;
        writeln!(f, "Records per window: {}", self.records_per_window)?;

        if !self.stream_records.is_empty() {
            writeln!(f, "Delivered records per stream:")?;
            for (stream, count) in &self.stream_records {
                writeln!(f, "  {stream}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics calculator (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Mean of the observed values
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}
