//! Outbound response and event types.

use serde::{Deserialize, Serialize};

use crate::types::{AcquisitionStatus, TransformResult};

/// A message written by the acquisition service, one per protocol line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    // === Events ===
    /// Snapshot from a fired analysis cycle
    Spectrum(TransformResult),

    // === Replies ===
    /// Counters and detected rate
    Status(AcquisitionStatus),

    /// Generic success
    Ok,

    /// Pong response to ping
    Pong,

    /// Error occurred
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Create a success response.
    pub fn ok() -> Self {
        Response::Ok
    }

    /// Check if this response indicates an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
