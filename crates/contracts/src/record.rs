//! Record types shared by every stream kind.
//!
//! One `Event` is a single change-detection sample of the camera; frames,
//! inertial samples and triggers are the companion stream elements that
//! travel through the same synchronization machinery.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Anything carrying a microsecond timestamp.
///
/// Implemented by every record type so the windowing engine can order and
/// slice heterogeneous streams the same way.
pub trait Timestamped {
    /// Microsecond timestamp of this record.
    fn timestamp(&self) -> Timestamp;
}

/// A single change-detection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Microsecond timestamp
    pub timestamp: Timestamp,

    /// Pixel column
    pub x: i16,

    /// Pixel row
    pub y: i16,

    /// Contrast change direction: true = brightness increase
    pub polarity: bool,
}

impl Event {
    /// Create a new event.
    #[inline]
    pub fn new(timestamp: Timestamp, x: i16, y: i16, polarity: bool) -> Self {
        Self {
            timestamp,
            x,
            y,
            polarity,
        }
    }
}

impl Timestamped for Event {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Accumulated or captured image frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Microsecond timestamp
    pub timestamp: Timestamp,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel format of `data`
    pub format: FrameFormat,

    /// Row-major pixel data (zero-copy)
    pub data: Bytes,
}

impl Timestamped for Frame {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Pixel format of a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    Gray8,
    Bgr8,
    Bgra8,
}

/// One inertial measurement sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Microsecond timestamp
    pub timestamp: Timestamp,

    /// Sensor temperature (°C)
    pub temperature: f32,

    /// Accelerometer (g)
    pub accelerometer: Vector3,

    /// Gyroscope (deg/s)
    pub gyroscope: Vector3,

    /// Magnetometer (µT)
    pub magnetometer: Vector3,
}

impl Timestamped for ImuSample {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// 3D vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// External synchronization signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Microsecond timestamp
    pub timestamp: Timestamp,

    /// What generated the signal
    pub source: TriggerSource,
}

impl Timestamped for Trigger {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Origin of a trigger signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Rising edge on the external signal input
    ExternalRisingEdge,
    /// Falling edge on the external signal input
    ExternalFallingEdge,
    /// Pulse on the external signal input
    ExternalPulse,
    /// Device timestamp counter was reset
    TimestampReset,
    /// Frame readout started
    FrameReadoutStart,
    /// Frame readout finished
    FrameReadoutEnd,
    /// Exposure started
    ExposureStart,
    /// Exposure finished
    ExposureEnd,
}

/// Kinds of record streams the engine knows how to buffer and slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Events,
    Frames,
    Imu,
    Triggers,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamKind::Events => "events",
            StreamKind::Frames => "frames",
            StreamKind::Imu => "imu",
            StreamKind::Triggers => "triggers",
        };
        write!(f, "{name}")
    }
}

/// A single record of any supported stream kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Event(Event),
    Frame(Frame),
    Imu(ImuSample),
    Trigger(Trigger),
}

impl Record {
    /// Stream kind this record belongs to.
    pub fn kind(&self) -> StreamKind {
        match self {
            Record::Event(_) => StreamKind::Events,
            Record::Frame(_) => StreamKind::Frames,
            Record::Imu(_) => StreamKind::Imu,
            Record::Trigger(_) => StreamKind::Triggers,
        }
    }
}

impl Timestamped for Record {
    fn timestamp(&self) -> Timestamp {
        match self {
            Record::Event(e) => e.timestamp,
            Record::Frame(f) => f.timestamp,
            Record::Imu(s) => s.timestamp,
            Record::Trigger(t) => t.timestamp,
        }
    }
}

impl From<Event> for Record {
    fn from(value: Event) -> Self {
        Record::Event(value)
    }
}

impl From<Frame> for Record {
    fn from(value: Frame) -> Self {
        Record::Frame(value)
    }
}

impl From<ImuSample> for Record {
    fn from(value: ImuSample) -> Self {
        Record::Imu(value)
    }
}

impl From<Trigger> for Record {
    fn from(value: Trigger) -> Self {
        Record::Trigger(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_timestamps() {
        let record: Record = Event::new(42, 1, 2, true).into();
        assert_eq!(record.timestamp(), 42);
        assert_eq!(record.kind(), StreamKind::Events);

        let record: Record = Trigger {
            timestamp: 7,
            source: TriggerSource::ExternalRisingEdge,
        }
        .into();
        assert_eq!(record.timestamp(), 7);
        assert_eq!(record.kind(), StreamKind::Triggers);
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = Event::new(1000, 320, 240, false);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
