//! Nordic DFU (Device Firmware Update) session coordination.
//!
//! The transfer itself (connection, packet framing, radio-level retries)
//! belongs to a platform firmware-update engine behind
//! [`DfuEngine`](crate::traits::DfuEngine). This module owns what sits
//! around it:
//!
//! 1. **Normalization** - validate the device identifier under the
//!    deployment's [`AddressPolicy`] and turn the firmware URI into a path
//! 2. **Single-flight** - reject a second start while a transfer is running
//! 3. **Translation** - map engine lifecycle callbacks to [`DfuState`] names
//!    and progress payloads
//! 4. **Completion** - settle the caller's pending completion exactly once
//!    on the terminal event
//!
//! # Example
//!
//! ```ignore
//! use nordic_dfu_session::dfu::{AddressPolicy, DfuCoordinator, DfuRequest};
//! use nordic_dfu_session::traits::completion_channel;
//!
//! let mut coordinator = DfuCoordinator::new(AddressPolicy::LinkLayer);
//! let (sink, outcome) = completion_channel();
//! coordinator.start(
//!     DfuRequest::new("AA:BB:CC:DD:EE:FF", "file:///tmp/fw.zip"),
//!     &engine,
//!     sink,
//! );
//! // ... engine events are fed through an EventTranslator ...
//! ```

mod config;
mod coordinator;
mod error;
mod events;
mod normalize;
mod session;

pub use config::{
    DfuOptions, DfuRequest, TransferOptions, ABORTED_MESSAGE, DEFAULT_CONNECTION_TIMEOUT_SECS,
};
pub use coordinator::{DfuCoordinator, DfuOutcome};
pub use error::{DfuError, DfuRejection, DfuResult, EngineError};
pub use events::{
    DfuEvent, DfuState, EventTranslator, ProgressPayload, StateChangedPayload, PROGRESS_EVENT,
    STATE_CHANGED_EVENT,
};
pub use normalize::{normalize_file_reference, AddressPolicy, AddressPolicyKind, DeviceId};
