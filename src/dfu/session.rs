//! The single mutable record behind a DFU session.

use chrono::{DateTime, Utc};

use super::coordinator::DfuOutcome;
use crate::traits::{Completion, TransferHandle};

/// Caller context recorded for the in-flight request.
pub struct PendingSession {
    pub completion: Completion<DfuOutcome>,
    pub device_address: String,
    pub started_at: DateTime<Utc>,
}

/// At most one transfer handle and one pending completion.
///
/// The pending completion and device address are recorded together before
/// the engine is started; the handle is attached once the engine returns it.
/// [`SessionState::reset`] always clears everything at once.
#[derive(Default)]
pub struct SessionState {
    pending: Option<PendingSession>,
    handle: Option<Box<dyn TransferHandle>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the caller's completion and target device.
    pub fn begin(&mut self, completion: Completion<DfuOutcome>, device_address: &str) {
        self.pending = Some(PendingSession {
            completion,
            device_address: device_address.to_string(),
            started_at: Utc::now(),
        });
    }

    /// Take ownership of the engine's transfer handle.
    pub fn attach(&mut self, handle: Box<dyn TransferHandle>) {
        self.handle = Some(handle);
    }

    /// Clear the whole record, returning the pending session if there was one.
    pub fn reset(&mut self) -> Option<PendingSession> {
        self.handle = None;
        self.pending.take()
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle_mut(&mut self) -> Option<&mut (dyn TransferHandle + 'static)> {
        self.handle.as_deref_mut()
    }

    pub fn device_address(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.device_address.as_str())
    }
}
