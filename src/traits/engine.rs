use tokio::sync::mpsc;

#[cfg(test)]
use mockall::automock;

use crate::dfu::{EngineError, TransferOptions};

/// Abstraction over the platform firmware-update engine.
/// The engine owns the transfer protocol; this layer only starts it.
#[cfg_attr(test, automock)]
pub trait DfuEngine: Send {
    /// Begin a transfer. Lifecycle is reported later through the
    /// engine's [`EngineEventSender`].
    fn start(&self, options: &TransferOptions) -> Result<Box<dyn TransferHandle>, EngineError>;
}

/// Live handle to one in-progress transfer.
#[cfg_attr(test, automock)]
pub trait TransferHandle: Send {
    /// Request cancellation. Returns whether the engine accepted it.
    fn abort(&mut self) -> bool;

    /// Whether the transfer has been marked aborted.
    fn is_aborted(&self) -> bool;
}

/// Progress figures reported by the engine while uploading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub percent: u8,
    /// Instantaneous speed, bytes per second.
    pub speed: f64,
    /// Running average speed, bytes per second.
    pub avg_speed: f64,
    pub current_part: u32,
    pub total_parts: u32,
}

/// Lifecycle signal raised by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connecting,
    Connected,
    ProcessStarting,
    ProcessStarted,
    EnablingDfuMode,
    Uploading(ProgressUpdate),
    Validating,
    Disconnecting,
    Disconnected,
    Completed,
    Aborted,
    Failed {
        code: i32,
        error_type: String,
        message: String,
    },
}

impl LifecycleEvent {
    /// Completed, aborted and failed end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Completed | LifecycleEvent::Aborted | LifecycleEvent::Failed { .. }
        )
    }
}

/// A lifecycle signal plus the device it concerns, when the engine knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub device_address: Option<String>,
    pub lifecycle: LifecycleEvent,
}

impl EngineEvent {
    pub fn new(device_address: impl Into<String>, lifecycle: LifecycleEvent) -> Self {
        Self {
            device_address: Some(device_address.into()),
            lifecycle,
        }
    }

    /// Event from an engine that does not report addresses with its callbacks.
    pub fn anonymous(lifecycle: LifecycleEvent) -> Self {
        Self {
            device_address: None,
            lifecycle,
        }
    }
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the in-order, single-consumer channel an engine adapter reports on.
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}
