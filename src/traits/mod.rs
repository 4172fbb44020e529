pub mod emitter;
pub mod engine;
pub mod notify;

pub use emitter::EventEmitter;
pub use engine::{
    engine_event_channel, DfuEngine, EngineEvent, EngineEventReceiver, EngineEventSender,
    LifecycleEvent, ProgressUpdate, TransferHandle,
};
pub use notify::{completion_channel, Completion, CompletionReceiver, CompletionSink};

#[cfg(test)]
pub use emitter::MockEventEmitter;
#[cfg(test)]
pub use engine::{MockDfuEngine, MockTransferHandle};
