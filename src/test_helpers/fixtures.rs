use crate::dfu::{DfuOptions, DfuRequest};
use crate::traits::{MockTransferHandle, ProgressUpdate, TransferHandle};

/// Transfer handle with no expectations, for sessions that are never aborted.
pub fn idle_handle() -> Box<dyn TransferHandle> {
    Box::new(MockTransferHandle::new())
}

/// Transfer handle whose abort returns `accepted` and whose abort-status
/// query returns `aborted`.
pub fn handle_with_abort(accepted: bool, aborted: bool) -> Box<dyn TransferHandle> {
    let mut handle = MockTransferHandle::new();
    handle.expect_abort().return_const(accepted);
    handle.expect_is_aborted().return_const(aborted);
    Box::new(handle)
}

/// Builder for creating test DfuRequest instances
pub struct RequestBuilder {
    device_address: String,
    file_uri: String,
    options: DfuOptions,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            device_address: "AA:BB:CC:DD:EE:FF".to_string(),
            file_uri: "file:///tmp/fw.zip".to_string(),
            options: DfuOptions::default(),
        }
    }

    pub fn device(mut self, address: &str) -> Self {
        self.device_address = address.to_string();
        self
    }

    pub fn file_uri(mut self, uri: &str) -> Self {
        self.file_uri = uri.to_string();
        self
    }

    pub fn connection_timeout_secs(mut self, secs: u64) -> Self {
        self.options.connection_timeout_secs = Some(secs);
        self
    }

    pub fn disable_resume(mut self, value: bool) -> Self {
        self.options.disable_resume = Some(value);
        self
    }

    pub fn packet_receipt_notification_parameter(mut self, packets: u16) -> Self {
        self.options.packet_receipt_notification_parameter = Some(packets);
        self
    }

    pub fn prepare_data_object_delay_ms(mut self, ms: u64) -> Self {
        self.options.prepare_data_object_delay_ms = Some(ms);
        self
    }

    pub fn build(self) -> DfuRequest {
        DfuRequest::new(self.device_address, self.file_uri).with_options(self.options)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ProgressUpdate instances
pub struct ProgressBuilder {
    progress: ProgressUpdate,
}

impl ProgressBuilder {
    pub fn new() -> Self {
        Self {
            progress: ProgressUpdate {
                percent: 25,
                speed: 1024.0,
                avg_speed: 512.0,
                current_part: 1,
                total_parts: 1,
            },
        }
    }

    pub fn percent(mut self, percent: u8) -> Self {
        self.progress.percent = percent;
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.progress.speed = speed;
        self
    }

    pub fn avg_speed(mut self, avg_speed: f64) -> Self {
        self.progress.avg_speed = avg_speed;
        self
    }

    pub fn parts(mut self, current: u32, total: u32) -> Self {
        self.progress.current_part = current;
        self.progress.total_parts = total;
        self
    }

    pub fn build(self) -> ProgressUpdate {
        self.progress
    }
}

impl Default for ProgressBuilder {
    fn default() -> Self {
        Self::new()
    }
}
