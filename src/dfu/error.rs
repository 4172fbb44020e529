//! DFU error types for the session coordinator.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for DFU operations.
pub type DfuResult<T> = Result<T, DfuError>;

/// Errors that can occur while coordinating a DFU session.
#[derive(Debug, Error)]
pub enum DfuError {
    /// Another session already owns a transfer handle.
    #[error("A DFU process is already running")]
    InProgress,

    /// Abort requested while no transfer is active.
    #[error("There is no DFU process currently running")]
    NoRunningDfu,

    /// The engine refused or could not abort the transfer.
    #[error("Unable to abort DFU process")]
    AbortFailed,

    /// Device identifier rejected by the address policy.
    #[error("Device address is invalid")]
    InvalidDeviceAddress { address: String },

    /// The engine adapter could not begin the transfer.
    #[error("Unable to start DFU: {0}")]
    StartFailed(#[from] EngineError),

    /// The engine reported a failure mid-transfer.
    #[error("Error: {code}, Error Type: {error_type}, Message: {message}")]
    Engine {
        code: i32,
        error_type: String,
        message: String,
    },

    /// The service loop owning the coordinator has shut down.
    #[error("The DFU service is no longer running")]
    ServiceStopped,
}

impl DfuError {
    /// Get the stable error code surfaced to callers.
    ///
    /// In-transfer engine failures pass the engine's numeric code through
    /// as a string.
    pub fn code(&self) -> String {
        match self {
            DfuError::InProgress => "dfu_in_progress".into(),
            DfuError::NoRunningDfu => "no_running_dfu".into(),
            DfuError::AbortFailed => "dfu_abort_failed".into(),
            DfuError::InvalidDeviceAddress { .. } => "invalid_device_address".into(),
            DfuError::StartFailed(_) => "dfu_start_failed".into(),
            DfuError::Engine { code, .. } => code.to_string(),
            DfuError::ServiceStopped => "dfu_service_stopped".into(),
        }
    }
}

/// Start-time failure reported by an engine adapter
/// (missing firmware, unreachable device, ...).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Rejection delivered to a caller's completion: a stable code plus a
/// human-readable message.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct DfuRejection {
    pub code: String,
    pub message: String,
}

impl DfuRejection {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<DfuError> for DfuRejection {
    fn from(error: DfuError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}
