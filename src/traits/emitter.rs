use tokio::sync::mpsc;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::dfu::DfuEvent;

/// Outbound notification channel to the embedding application.
#[cfg_attr(test, automock)]
pub trait EventEmitter: Send {
    fn emit(&self, event: DfuEvent);
}

impl EventEmitter for mpsc::UnboundedSender<DfuEvent> {
    fn emit(&self, event: DfuEvent) {
        if let Err(e) = self.send(event) {
            warn!(event = e.0.name(), "No listener for DFU event");
        }
    }
}
