//! Translation of engine lifecycle signals into the outbound event vocabulary.
//!
//! Every engine callback maps to exactly one outbound event: a
//! `DFUStateChanged` carrying one of the fixed [`DfuState`] names, or a
//! `DFUProgress` carrying the six progress figures. Terminal callbacks also
//! settle the coordinator's pending completion, after the state is emitted.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::coordinator::DfuCoordinator;
use crate::traits::{EngineEvent, EventEmitter, LifecycleEvent, ProgressUpdate};

/// Outbound channel name for state changes.
pub const STATE_CHANGED_EVENT: &str = "DFUStateChanged";

/// Outbound channel name for upload progress.
pub const PROGRESS_EVENT: &str = "DFUProgress";

/// Fixed vocabulary of DFU states reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DfuState {
    #[serde(rename = "CONNECTING")]
    Connecting,
    #[serde(rename = "CONNECTED")]
    Connected,
    #[serde(rename = "DFU_PROCESS_STARTING")]
    ProcessStarting,
    #[serde(rename = "DFU_PROCESS_STARTED")]
    ProcessStarted,
    #[serde(rename = "ENABLING_DFU_MODE")]
    EnablingDfuMode,
    #[serde(rename = "DFU_UPLOADING")]
    Uploading,
    #[serde(rename = "FIRMWARE_VALIDATING")]
    FirmwareValidating,
    #[serde(rename = "DEVICE_DISCONNECTING")]
    DeviceDisconnecting,
    #[serde(rename = "DEVICE_DISCONNECTED")]
    DeviceDisconnected,
    #[serde(rename = "DFU_COMPLETED")]
    Completed,
    #[serde(rename = "DFU_ABORTED")]
    Aborted,
    #[serde(rename = "DFU_FAILED")]
    Failed,
}

impl DfuState {
    /// Wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            DfuState::Connecting => "CONNECTING",
            DfuState::Connected => "CONNECTED",
            DfuState::ProcessStarting => "DFU_PROCESS_STARTING",
            DfuState::ProcessStarted => "DFU_PROCESS_STARTED",
            DfuState::EnablingDfuMode => "ENABLING_DFU_MODE",
            DfuState::Uploading => "DFU_UPLOADING",
            DfuState::FirmwareValidating => "FIRMWARE_VALIDATING",
            DfuState::DeviceDisconnecting => "DEVICE_DISCONNECTING",
            DfuState::DeviceDisconnected => "DEVICE_DISCONNECTED",
            DfuState::Completed => "DFU_COMPLETED",
            DfuState::Aborted => "DFU_ABORTED",
            DfuState::Failed => "DFU_FAILED",
        }
    }

    /// State reported for a lifecycle event. Progress updates have none;
    /// they go out as [`DfuEvent::Progress`].
    pub fn from_lifecycle(event: &LifecycleEvent) -> Option<Self> {
        let state = match event {
            LifecycleEvent::Connecting => DfuState::Connecting,
            LifecycleEvent::Connected => DfuState::Connected,
            LifecycleEvent::ProcessStarting => DfuState::ProcessStarting,
            LifecycleEvent::ProcessStarted => DfuState::ProcessStarted,
            LifecycleEvent::EnablingDfuMode => DfuState::EnablingDfuMode,
            LifecycleEvent::Uploading(_) => return None,
            LifecycleEvent::Validating => DfuState::FirmwareValidating,
            LifecycleEvent::Disconnecting => DfuState::DeviceDisconnecting,
            LifecycleEvent::Disconnected => DfuState::DeviceDisconnected,
            LifecycleEvent::Completed => DfuState::Completed,
            LifecycleEvent::Aborted => DfuState::Aborted,
            LifecycleEvent::Failed { .. } => DfuState::Failed,
        };
        Some(state)
    }
}

/// Payload of a `DFUStateChanged` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedPayload {
    pub state: DfuState,
    pub device_address: String,
}

/// Payload of a `DFUProgress` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub device_address: String,
    pub percent: u8,
    pub speed: f64,
    pub avg_speed: f64,
    pub current_part: u32,
    pub total_parts: u32,
}

impl ProgressPayload {
    pub fn new(device_address: impl Into<String>, progress: ProgressUpdate) -> Self {
        Self {
            device_address: device_address.into(),
            percent: progress.percent,
            speed: progress.speed,
            avg_speed: progress.avg_speed,
            current_part: progress.current_part,
            total_parts: progress.total_parts,
        }
    }
}

/// Event delivered to the embedding application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DfuEvent {
    StateChanged(StateChangedPayload),
    Progress(ProgressPayload),
}

impl DfuEvent {
    /// Channel name the event is published on.
    pub fn name(&self) -> &'static str {
        match self {
            DfuEvent::StateChanged(_) => STATE_CHANGED_EVENT,
            DfuEvent::Progress(_) => PROGRESS_EVENT,
        }
    }
}

/// Forwards engine events to the application and settles terminal ones.
pub struct EventTranslator<M: EventEmitter> {
    emitter: M,
}

impl<M: EventEmitter> EventTranslator<M> {
    pub fn new(emitter: M) -> Self {
        Self { emitter }
    }

    /// Translate one engine event.
    ///
    /// Events that carry no address are attributed to the active session;
    /// with no active session they are dropped.
    pub fn dispatch(&self, coordinator: &mut DfuCoordinator, event: EngineEvent) {
        let EngineEvent {
            device_address,
            lifecycle,
        } = event;

        let device_address = match device_address
            .or_else(|| coordinator.current_device_address().map(str::to_string))
        {
            Some(address) => address,
            None => {
                debug!(?lifecycle, "Dropping engine event with no device address");
                return;
            }
        };

        let state = match DfuState::from_lifecycle(&lifecycle) {
            Some(state) => state,
            None => {
                if let LifecycleEvent::Uploading(progress) = lifecycle {
                    self.emitter
                        .emit(DfuEvent::Progress(ProgressPayload::new(device_address, progress)));
                }
                return;
            }
        };

        info!(state = state.as_str(), device_address = %device_address, "DFU state changed");
        self.emitter.emit(DfuEvent::StateChanged(StateChangedPayload {
            state,
            device_address: device_address.clone(),
        }));

        if lifecycle.is_terminal() {
            settle(coordinator, device_address, lifecycle);
        }
    }
}

/// Settle the active session. A terminal event reported for another device
/// still ends the session, but the outcome names the active device.
fn settle(coordinator: &mut DfuCoordinator, reported: String, lifecycle: LifecycleEvent) {
    let device_address = match coordinator.current_device_address() {
        Some(active) if active != reported => {
            warn!(
                active = %active,
                reported = %reported,
                "Terminal event reported for a different device"
            );
            active.to_string()
        }
        _ => reported,
    };

    match lifecycle {
        LifecycleEvent::Completed => coordinator.on_completed(&device_address),
        LifecycleEvent::Aborted => coordinator.on_aborted(),
        LifecycleEvent::Failed {
            code,
            error_type,
            message,
        } => coordinator.on_error(code, &error_type, &message),
        _ => {}
    }
}
