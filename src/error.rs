//! Error types for atwire.

use std::time::Duration;

use thiserror::Error;

use crate::config::TimeoutClass;
use crate::protocol::{ConfirmStatus, DeviceError};

/// Main error type for all engine, codec and catalog operations.
#[derive(Debug, Error)]
pub enum AtError {
    /// A composed argument does not fit into the command buffer.
    #[error("command buffer overflow: capacity {capacity} bytes, need {required}")]
    EncodingOverflow { capacity: usize, required: usize },

    /// An integer does not fit the declared width/signedness.
    #[error("value {value} out of range for {format}")]
    ValueOutOfRange { value: i64, format: String },

    /// Token is not valid for the requested type, or no delimiter within bound.
    #[error("malformed argument: {0}")]
    DecodingMalformed(String),

    /// Destination is too small for the decoded token.
    #[error("argument truncated: capacity {capacity} bytes, got {actual}")]
    DecodingTruncated { capacity: usize, actual: usize },

    /// No confirmation arrived within the timeout mapped from the class.
    #[error("no confirmation for {class:?} request after {after:?}")]
    TransactionTimeout { class: TimeoutClass, after: Duration },

    /// The device answered with a structured error code.
    #[error("device reported {0}")]
    DeviceReported(DeviceError),

    /// A confirmation arrived but not the one the caller expected.
    #[error("expected confirmation {expected}, got {actual}")]
    UnexpectedStatus {
        expected: ConfirmStatus,
        actual: ConfirmStatus,
    },

    /// A status line was recognized but could not be parsed.
    #[error("malformed confirmation line: {0:?}")]
    MalformedConfirmation(String),

    /// Sending bytes to the device failed.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] std::io::Error),

    /// Another transaction holds the command buffer.
    #[error("another request is already in flight")]
    Busy,

    /// Reader or writer task has stopped.
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AtError {
    /// The confirmation status the device actually sent, if this error carries one.
    pub fn status(&self) -> Option<ConfirmStatus> {
        match self {
            AtError::UnexpectedStatus { actual, .. } => Some(*actual),
            AtError::DeviceReported(err) => Some(ConfirmStatus::Device(*err)),
            _ => None,
        }
    }

    /// The structured device error, if the device reported one.
    pub fn device_error(&self) -> Option<DeviceError> {
        match self {
            AtError::DeviceReported(err) => Some(*err),
            _ => None,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        AtError::DecodingMalformed(msg.into())
    }
}

/// Result type alias using AtError.
pub type Result<T> = std::result::Result<T, AtError>;
