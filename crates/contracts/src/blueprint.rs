//! PipelineBlueprint - Config Loader output
//!
//! Describes the full pipeline setup: stream declarations, store tuning,
//! time-surface geometry and slicer wiring.

use serde::{Deserialize, Serialize};

use crate::StreamKind;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Stream declarations
    pub streams: Vec<StreamConfig>,

    /// Event store tuning
    #[serde(default)]
    pub store: StoreConfig,

    /// Time-surface geometry
    #[serde(default)]
    pub surface: SurfaceConfig,

    /// Slicer wiring
    pub slicer: SlicerConfig,
}

/// One declared stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique stream name
    pub name: String,

    /// Kind of records the stream carries
    pub kind: StreamKind,

    /// Pixel width (required for event streams)
    #[serde(default)]
    pub width: Option<u32>,

    /// Pixel height (required for event streams)
    #[serde(default)]
    pub height: Option<u32>,

    /// Nominal production rate (Hz), diagnostics only
    #[serde(default)]
    pub rate_hz: Option<f64>,
}

/// Event store tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Capacity of newly allocated shards, in records
    #[serde(default = "default_shard_capacity")]
    pub shard_capacity: usize,

    /// Minimum duration of history to keep, in microseconds
    #[serde(default)]
    pub retain_duration_us: Option<i64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shard_capacity: default_shard_capacity(),
            retain_duration_us: None,
        }
    }
}

fn default_shard_capacity() -> usize {
    10_000
}

/// Time-surface geometry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Grid rows; defaults to the main event stream's height
    #[serde(default)]
    pub rows: Option<u32>,

    /// Grid columns; defaults to the main event stream's width
    #[serde(default)]
    pub cols: Option<u32>,

    /// Patch diameter of the speed-invariant update; even, in (0, 16)
    #[serde(default = "default_patch_diameter")]
    pub patch_diameter: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            rows: None,
            cols: None,
            patch_diameter: default_patch_diameter(),
        }
    }
}

fn default_patch_diameter() -> u32 {
    8
}

/// Slicer wiring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicerConfig {
    /// Name of the stream that drives slicing
    pub main_stream: String,

    /// Minimum number of records retained per secondary stream
    #[serde(default = "default_min_retained_records")]
    pub min_retained_records: usize,
}

fn default_min_retained_records() -> usize {
    0
}

impl PipelineBlueprint {
    /// Look up a declared stream by name
    pub fn stream(&self, name: &str) -> Option<&StreamConfig> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Grid shape for the time surface: explicit values win, otherwise the
    /// dimensions of the main stream (when it is an event stream).
    pub fn surface_shape(&self) -> Option<(u32, u32)> {
        if let (Some(rows), Some(cols)) = (self.surface.rows, self.surface.cols) {
            return Some((rows, cols));
        }

        let main = self.stream(&self.slicer.main_stream)?;
        match (main.kind, main.height, main.width) {
            (StreamKind::Events, Some(h), Some(w)) => Some((h, w)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: ConfigVersion::V1,
            streams: vec![
                StreamConfig {
                    name: "events".into(),
                    kind: StreamKind::Events,
                    width: Some(640),
                    height: Some(480),
                    rate_hz: None,
                },
                StreamConfig {
                    name: "frames".into(),
                    kind: StreamKind::Frames,
                    width: None,
                    height: None,
                    rate_hz: Some(25.0),
                },
            ],
            store: StoreConfig::default(),
            surface: SurfaceConfig::default(),
            slicer: SlicerConfig {
                main_stream: "events".into(),
                min_retained_records: 0,
            },
        }
    }

    #[test]
    fn test_surface_shape_defaults_to_main_stream() {
        let bp = sample_blueprint();
        assert_eq!(bp.surface_shape(), Some((480, 640)));
    }

    #[test]
    fn test_surface_shape_explicit_override() {
        let mut bp = sample_blueprint();
        bp.surface.rows = Some(260);
        bp.surface.cols = Some(346);
        assert_eq!(bp.surface_shape(), Some((260, 346)));
    }

    #[test]
    fn test_store_defaults() {
        let bp = sample_blueprint();
        assert_eq!(bp.store.shard_capacity, 10_000);
        assert_eq!(bp.store.retain_duration_us, None);
    }
}
