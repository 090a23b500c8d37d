//! Layered error definitions
//!
//! Categorized by source: config / store / slicing / stream

use thiserror::Error;

use crate::{StreamId, Timestamp};

/// Unified error type
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Store Errors =====
    /// Appended or merged data starts before existing data
    #[error("ordering violation: timestamp {attempted} precedes highest stored time {highest}")]
    OrderingViolation {
        highest: Timestamp,
        attempted: Timestamp,
    },

    /// Index or time range outside the valid bounds of a container
    #[error("out of range: {message}")]
    OutOfRange { message: String },

    // ===== Argument Errors =====
    /// Malformed caller-supplied parameter
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    // ===== Stream Errors =====
    /// Data of the wrong kind supplied for a typed stream
    #[error("invalid data kind supplied for stream '{stream}': expected {expected}, got {actual}")]
    TypeMismatch {
        stream: StreamId,
        expected: String,
        actual: String,
    },

    /// Stream name not registered with the slicer
    #[error("unknown stream: '{stream}'")]
    UnknownStream { stream: StreamId },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create ordering violation error
    pub fn ordering(highest: Timestamp, attempted: Timestamp) -> Self {
        Self::OrderingViolation { highest, attempted }
    }

    /// Create out-of-range error
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: message.into(),
        }
    }

    /// Create invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create type-mismatch error for a typed stream
    pub fn type_mismatch(
        stream: impl Into<StreamId>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            stream: stream.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create unknown-stream error
    pub fn unknown_stream(stream: impl Into<StreamId>) -> Self {
        Self::UnknownStream {
            stream: stream.into(),
        }
    }
}
