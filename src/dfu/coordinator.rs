//! Single-flight DFU session coordinator.
//!
//! Owns the [`SessionState`] and enforces its rules:
//! - only one transfer may be in flight; a second `start` is rejected
//!   without touching the engine,
//! - every accepted `start` settles its completion exactly once, either
//!   synchronously (validation/start failure) or when the engine reports a
//!   terminal event,
//! - `abort` answers on its own completion and leaves the session's
//!   completion to the engine's eventual aborted/failed event.
//!
//! The coordinator holds no locks. All calls, including engine callbacks,
//! must be made from one execution context (see `commands::dfu`).

use std::fmt;

use chrono::Utc;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{debug, info, warn};

use super::config::{DfuRequest, TransferOptions, ABORTED_MESSAGE};
use super::error::{DfuError, DfuRejection};
use super::normalize::{normalize_file_reference, AddressPolicy};
use super::session::{PendingSession, SessionState};
use crate::traits::{Completion, DfuEngine};

/// Successful outcome of a DFU session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DfuOutcome {
    /// Serializes as `{"deviceAddress": ...}`.
    Completed { device_address: String },
    /// Serializes as the string `"DFU was aborted"`.
    Aborted,
}

impl Serialize for DfuOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DfuOutcome::Completed { device_address } => {
                let mut state = serializer.serialize_struct("DfuOutcome", 1)?;
                state.serialize_field("deviceAddress", device_address)?;
                state.end()
            }
            DfuOutcome::Aborted => serializer.serialize_str(ABORTED_MESSAGE),
        }
    }
}

/// Coordinates at most one DFU session at a time.
pub struct DfuCoordinator {
    policy: AddressPolicy,
    session: SessionState,
}

impl DfuCoordinator {
    /// Create a coordinator validating device identifiers with `policy`.
    pub fn new(policy: AddressPolicy) -> Self {
        Self {
            policy,
            session: SessionState::new(),
        }
    }

    /// Start a transfer for `request`.
    ///
    /// Returns once the engine has handed back a transfer handle or the
    /// start has failed. `completion` settles later, on the engine's
    /// terminal event, unless the start fails here.
    pub fn start(
        &mut self,
        request: DfuRequest,
        engine: &dyn DfuEngine,
        completion: Completion<DfuOutcome>,
    ) {
        if self.session.has_handle() {
            warn!(
                device_address = %request.device_address,
                "Rejecting DFU start, another session is running"
            );
            completion.reject(DfuError::InProgress.into());
            return;
        }

        // Recorded before the engine runs so start failures settle through
        // the same path as in-flight ones.
        self.session.begin(completion, &request.device_address);

        let device = match self.policy.validate(&request.device_address) {
            Ok(device) => device,
            Err(e) => {
                self.reject_pending(e);
                return;
            }
        };

        let file_path = normalize_file_reference(&request.file_uri);
        let options = TransferOptions::new(device, file_path, &request.options);
        debug!(?options, "Starting DFU engine");

        match engine.start(&options) {
            Ok(handle) => {
                info!(
                    device_address = %request.device_address,
                    file_path = %options.file_path,
                    "DFU transfer started"
                );
                self.session.attach(handle);
            }
            Err(e) => self.reject_pending(DfuError::StartFailed(e)),
        }
    }

    /// Ask the engine to abort the running transfer.
    ///
    /// `completion` reports whether the engine accepted the request. The
    /// session completion settles when the engine emits aborted/failed.
    pub fn abort(&mut self, completion: Completion<()>) {
        let Some(handle) = self.session.handle_mut() else {
            completion.reject(DfuError::NoRunningDfu.into());
            return;
        };

        if handle.abort() || handle.is_aborted() {
            info!("DFU abort accepted by engine");
            completion.resolve(());
        } else {
            warn!("DFU abort refused by engine");
            completion.reject(DfuError::AbortFailed.into());
        }
    }

    /// Engine reported successful completion.
    pub fn on_completed(&mut self, device_address: &str) {
        if let Some(pending) = self.finish("completed") {
            pending.completion.resolve(DfuOutcome::Completed {
                device_address: device_address.to_string(),
            });
        }
    }

    /// Engine reported that the transfer was aborted.
    pub fn on_aborted(&mut self) {
        if let Some(pending) = self.finish("aborted") {
            pending.completion.resolve(DfuOutcome::Aborted);
        }
    }

    /// Engine reported an in-flight failure.
    pub fn on_error(&mut self, code: i32, error_type: impl fmt::Display, message: &str) {
        if let Some(pending) = self.finish("failed") {
            let error = DfuError::Engine {
                code,
                error_type: error_type.to_string(),
                message: message.to_string(),
            };
            pending.completion.reject(DfuRejection::from(error));
        }
    }

    /// Whether a transfer handle is held.
    pub fn is_running(&self) -> bool {
        self.session.has_handle()
    }

    /// Device address of the in-flight request.
    pub fn current_device_address(&self) -> Option<&str> {
        self.session.device_address()
    }

    fn reject_pending(&mut self, error: DfuError) {
        warn!(code = %error.code(), "DFU start failed: {}", error);
        if let Some(pending) = self.session.reset() {
            pending.completion.reject(error.into());
        }
    }

    fn finish(&mut self, outcome: &str) -> Option<PendingSession> {
        let pending = self.session.reset();
        match &pending {
            Some(p) => info!(
                device_address = %p.device_address,
                elapsed_ms = (Utc::now() - p.started_at).num_milliseconds(),
                "DFU session {}",
                outcome
            ),
            None => debug!("Ignoring {} event with no pending DFU session", outcome),
        }
        pending
    }
}
