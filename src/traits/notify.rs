use tokio::sync::oneshot;
use tracing::debug;

use crate::dfu::DfuRejection;

/// One-shot sink for the outcome of a caller's request.
///
/// Both methods consume the sink, so settling twice cannot be expressed.
pub trait CompletionSink<T>: Send {
    fn resolve(self: Box<Self>, value: T);
    fn reject(self: Box<Self>, rejection: DfuRejection);
}

/// Boxed sink as stored by the coordinator.
pub type Completion<T> = Box<dyn CompletionSink<T>>;

/// Receiving half of a [`completion_channel`].
pub type CompletionReceiver<T> = oneshot::Receiver<Result<T, DfuRejection>>;

impl<T: Send> CompletionSink<T> for oneshot::Sender<Result<T, DfuRejection>> {
    fn resolve(self: Box<Self>, value: T) {
        if (*self).send(Ok(value)).is_err() {
            debug!("Completion receiver dropped before resolve");
        }
    }

    fn reject(self: Box<Self>, rejection: DfuRejection) {
        if (*self).send(Err(rejection)).is_err() {
            debug!("Completion receiver dropped before reject");
        }
    }
}

/// Create a boxed sink and the receiver that observes it.
pub fn completion_channel<T: Send + 'static>() -> (Completion<T>, CompletionReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (Box::new(tx), rx)
}
