//! Request and option types for a DFU session, plus the defaults applied
//! when handing them to the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::normalize::DeviceId;

// ============================================================================
// Defaults
// ============================================================================

/// Connection timeout used when the request does not specify one.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Value resolved to the session completion when the engine reports an abort.
pub const ABORTED_MESSAGE: &str = "DFU was aborted";

// ============================================================================
// Caller-facing request
// ============================================================================

/// Tuning parameters for one update attempt.
///
/// Every field is optional; unset fields are left to the engine's own
/// defaults (or filled from persisted settings via [`DfuOptions::or`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfuOptions {
    /// Advertising name the engine should look for after a bootloader jump.
    #[serde(default)]
    pub device_name: Option<String>,

    /// Keep the bond information after the update.
    #[serde(default)]
    pub keep_bond: Option<bool>,

    /// Radio-level retry count owned by the engine.
    #[serde(default)]
    pub number_of_retries: Option<u32>,

    /// Packets between receipt notifications. Zero disables them.
    #[serde(default)]
    pub packet_receipt_notification_parameter: Option<u16>,

    /// Delay before each data object is prepared, in milliseconds.
    #[serde(default)]
    pub prepare_data_object_delay_ms: Option<u64>,

    /// Connection timeout, in seconds.
    #[serde(default)]
    pub connection_timeout_secs: Option<u64>,

    /// Force a fresh transfer instead of resuming a partial one.
    #[serde(default)]
    pub disable_resume: Option<bool>,
}

impl DfuOptions {
    /// Fill every unset field from `defaults`.
    pub fn or(self, defaults: &DfuOptions) -> DfuOptions {
        DfuOptions {
            device_name: self.device_name.or_else(|| defaults.device_name.clone()),
            keep_bond: self.keep_bond.or(defaults.keep_bond),
            number_of_retries: self.number_of_retries.or(defaults.number_of_retries),
            packet_receipt_notification_parameter: self
                .packet_receipt_notification_parameter
                .or(defaults.packet_receipt_notification_parameter),
            prepare_data_object_delay_ms: self
                .prepare_data_object_delay_ms
                .or(defaults.prepare_data_object_delay_ms),
            connection_timeout_secs: self
                .connection_timeout_secs
                .or(defaults.connection_timeout_secs),
            disable_resume: self.disable_resume.or(defaults.disable_resume),
        }
    }
}

/// One update attempt: which device, which firmware, how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfuRequest {
    /// Opaque device identifier (MAC-like or UUID string depending on platform).
    pub device_address: String,
    /// Firmware package reference, usually a `file://` URI.
    pub file_uri: String,
    #[serde(default)]
    pub options: DfuOptions,
}

impl DfuRequest {
    pub fn new(device_address: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self {
            device_address: device_address.into(),
            file_uri: file_uri.into(),
            options: DfuOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DfuOptions) -> Self {
        self.options = options;
        self
    }
}

// ============================================================================
// Engine-facing options
// ============================================================================

/// Validated, normalized options handed to the engine adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOptions {
    pub device: DeviceId,
    /// Local filesystem path of the firmware package.
    pub file_path: String,
    pub connection_timeout: Duration,
    /// `Some(n)` enables receipt notifications every `n` packets; `None`
    /// leaves them disabled.
    pub packet_receipt_notifications: Option<u16>,
    pub prepare_data_object_delay: Option<Duration>,
    pub device_name: Option<String>,
    pub keep_bond: Option<bool>,
    pub number_of_retries: Option<u32>,
    pub disable_resume: Option<bool>,
}

impl TransferOptions {
    /// Build engine options from a validated device and normalized path.
    pub fn new(device: DeviceId, file_path: String, options: &DfuOptions) -> Self {
        Self {
            device,
            file_path,
            connection_timeout: Duration::from_secs(
                options
                    .connection_timeout_secs
                    .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS),
            ),
            packet_receipt_notifications: options
                .packet_receipt_notification_parameter
                .filter(|packets| *packets > 0),
            prepare_data_object_delay: options
                .prepare_data_object_delay_ms
                .map(Duration::from_millis),
            device_name: options.device_name.clone(),
            keep_bond: options.keep_bond,
            number_of_retries: options.number_of_retries,
            disable_resume: options.disable_resume,
        }
    }
}
