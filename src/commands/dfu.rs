//! Caller-facing DFU commands.
//!
//! The coordinator is not thread-safe, so it lives inside one tokio task
//! together with the event translator and the engine. Caller commands and
//! engine events reach that task over two FIFO channels and are handled
//! one at a time; [`DfuServiceHandle`] is the cloneable front end.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::dfu::{
    AddressPolicy, DfuCoordinator, DfuError, DfuOptions, DfuOutcome, DfuRejection, DfuRequest,
    EventTranslator,
};
use crate::settings::DfuSettings;
use crate::traits::{
    completion_channel, Completion, DfuEngine, EngineEventReceiver, EventEmitter,
};

enum Command {
    Start {
        request: DfuRequest,
        reply: Completion<DfuOutcome>,
    },
    Abort {
        reply: Completion<()>,
    },
    IsRunning {
        reply: oneshot::Sender<bool>,
    },
    CurrentDevice {
        reply: oneshot::Sender<Option<String>>,
    },
}

/// Cloneable handle to a running DFU service.
///
/// The service stops once every handle has been dropped.
#[derive(Clone)]
pub struct DfuServiceHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl DfuServiceHandle {
    /// Start a firmware update.
    ///
    /// The request is queued immediately; the returned future resolves with
    /// the session outcome once the engine reports a terminal event, or with
    /// the rejection if the start is refused.
    pub fn start_dfu(
        &self,
        request: DfuRequest,
    ) -> impl Future<Output = Result<DfuOutcome, DfuRejection>> + Send + 'static {
        let (reply, outcome) = completion_channel();
        self.send(Command::Start { request, reply });
        async move { outcome.await.unwrap_or_else(|_| Err(DfuError::ServiceStopped.into())) }
    }

    /// Ask the engine to abort the running update.
    ///
    /// Resolves as soon as the engine accepts or refuses; the pending
    /// [`start_dfu`](Self::start_dfu) future settles separately.
    pub fn abort_dfu(&self) -> impl Future<Output = Result<(), DfuRejection>> + Send + 'static {
        let (reply, outcome) = completion_channel();
        self.send(Command::Abort { reply });
        async move { outcome.await.unwrap_or_else(|_| Err(DfuError::ServiceStopped.into())) }
    }

    /// Whether a transfer is currently running. False once the service stopped.
    pub async fn is_running(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(Command::IsRunning { reply });
        rx.await.unwrap_or(false)
    }

    /// Device address of the running transfer.
    pub async fn current_device_address(&self) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CurrentDevice { reply });
        rx.await.ok().flatten()
    }

    fn send(&self, command: Command) {
        // A dropped command drops its reply, which the caller sees as ServiceStopped
        if self.commands.send(command).is_err() {
            debug!("DFU service is not running");
        }
    }
}

struct DfuService<E: DfuEngine, M: EventEmitter> {
    coordinator: DfuCoordinator,
    translator: EventTranslator<M>,
    engine: E,
    defaults: DfuOptions,
}

impl<E: DfuEngine, M: EventEmitter> DfuService<E, M> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: EngineEventReceiver,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => {
                    self.translator.dispatch(&mut self.coordinator, event);
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        info!(
            running = self.coordinator.is_running(),
            "DFU service stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { request, reply } => {
                let request = DfuRequest {
                    options: request.options.or(&self.defaults),
                    ..request
                };
                self.coordinator.start(request, &self.engine, reply);
            }
            Command::Abort { reply } => self.coordinator.abort(reply),
            Command::IsRunning { reply } => {
                let _ = reply.send(self.coordinator.is_running());
            }
            Command::CurrentDevice { reply } => {
                let address = self.coordinator.current_device_address().map(str::to_string);
                let _ = reply.send(address);
            }
        }
    }
}

/// Spawn the DFU service on the current tokio runtime.
///
/// # Arguments
/// * `engine` - Platform engine adapter
/// * `events` - Receiving end of the channel the engine reports on
/// * `emitter` - Outbound channel for state and progress events
/// * `settings` - Address policy and default options for this deployment
pub fn spawn_dfu_service<E, M>(
    engine: E,
    events: EngineEventReceiver,
    emitter: M,
    settings: &DfuSettings,
) -> DfuServiceHandle
where
    E: DfuEngine + 'static,
    M: EventEmitter + 'static,
{
    spawn_dfu_service_with_policy(
        engine,
        events,
        emitter,
        settings.address_policy(),
        settings.default_options.clone(),
    )
}

/// Like [`spawn_dfu_service`], for policies settings cannot express
/// (e.g. [`AddressPolicy::Custom`]).
pub fn spawn_dfu_service_with_policy<E, M>(
    engine: E,
    events: EngineEventReceiver,
    emitter: M,
    policy: AddressPolicy,
    defaults: DfuOptions,
) -> DfuServiceHandle
where
    E: DfuEngine + 'static,
    M: EventEmitter + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    info!(?policy, "Starting DFU service");
    let service = DfuService {
        coordinator: DfuCoordinator::new(policy),
        translator: EventTranslator::new(emitter),
        engine,
        defaults,
    };
    tokio::spawn(service.run(rx, events));

    DfuServiceHandle { commands: tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfu::{DfuEvent, DfuState, StateChangedPayload};
    use crate::settings::SettingsManager;
    use crate::test_helpers::temp::TestContext;
    use std::sync::Arc;
    use crate::test_helpers::fixtures::{handle_with_abort, idle_handle, ProgressBuilder, RequestBuilder};
    use crate::traits::{
        engine_event_channel, EngineEvent, EngineEventSender, LifecycleEvent, MockDfuEngine,
    };

    const DEVICE: &str = "AA:BB:CC:DD:EE:FF";

    struct Harness {
        handle: DfuServiceHandle,
        engine_events: EngineEventSender,
        outbound: mpsc::UnboundedReceiver<DfuEvent>,
    }

    fn spawn_with(engine: MockDfuEngine, defaults: DfuOptions) -> Harness {
        spawn_with_settings(
            engine,
            &DfuSettings {
                default_options: defaults,
                ..Default::default()
            },
        )
    }

    fn spawn_with_settings(engine: MockDfuEngine, settings: &DfuSettings) -> Harness {
        let (engine_events, events) = engine_event_channel();
        let (emitter, outbound) = mpsc::unbounded_channel();
        let handle = spawn_dfu_service(engine, events, emitter, settings);
        Harness {
            handle,
            engine_events,
            outbound,
        }
    }

    fn engine_with_handle(times: usize) -> MockDfuEngine {
        let mut engine = MockDfuEngine::new();
        engine
            .expect_start()
            .times(times)
            .returning(|_| Ok(idle_handle()));
        engine
    }

    fn state(state: DfuState) -> DfuEvent {
        DfuEvent::StateChanged(StateChangedPayload {
            state,
            device_address: DEVICE.into(),
        })
    }

    #[tokio::test]
    async fn test_full_session_emits_states_and_resolves() {
        let mut h = spawn_with(engine_with_handle(1), DfuOptions::default());

        let outcome = h.handle.start_dfu(RequestBuilder::new().build());
        assert!(h.handle.is_running().await);
        for lifecycle in [
            LifecycleEvent::Connecting,
            LifecycleEvent::Connected,
            LifecycleEvent::Uploading(ProgressBuilder::new().percent(50).build()),
            LifecycleEvent::Completed,
        ] {
            h.engine_events.send(EngineEvent::new(DEVICE, lifecycle)).unwrap();
        }

        assert_eq!(
            outcome.await,
            Ok(DfuOutcome::Completed {
                device_address: DEVICE.into()
            })
        );
        assert_eq!(h.outbound.recv().await.unwrap(), state(DfuState::Connecting));
        assert_eq!(h.outbound.recv().await.unwrap(), state(DfuState::Connected));
        match h.outbound.recv().await.unwrap() {
            DfuEvent::Progress(progress) => assert_eq!(progress.percent, 50),
            other => panic!("expected progress, got {:?}", other),
        }
        assert_eq!(h.outbound.recv().await.unwrap(), state(DfuState::Completed));
        assert!(!h.handle.is_running().await);
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let h = spawn_with(engine_with_handle(1), DfuOptions::default());

        let first = h.handle.start_dfu(RequestBuilder::new().build());
        let second = h
            .handle
            .start_dfu(RequestBuilder::new().device("11:22:33:44:55:66").build())
            .await;

        assert_eq!(second.unwrap_err().code, "dfu_in_progress");
        assert!(h.handle.is_running().await);
        assert_eq!(
            h.handle.current_device_address().await.as_deref(),
            Some(DEVICE)
        );

        h.engine_events
            .send(EngineEvent::new(DEVICE, LifecycleEvent::Completed))
            .unwrap();
        assert!(first.await.is_ok());
    }

    #[tokio::test]
    async fn test_start_accepted_after_failure() {
        let h = spawn_with(engine_with_handle(2), DfuOptions::default());

        let first = h.handle.start_dfu(RequestBuilder::new().build());
        assert!(h.handle.is_running().await);
        h.engine_events
            .send(EngineEvent::anonymous(LifecycleEvent::Failed {
                code: 133,
                error_type: "GATT".into(),
                message: "link lost".into(),
            }))
            .unwrap();
        assert_eq!(first.await.unwrap_err().code, "133");
        assert!(!h.handle.is_running().await);

        let second = h.handle.start_dfu(RequestBuilder::new().build());
        assert!(h.handle.is_running().await);
        h.engine_events
            .send(EngineEvent::new(DEVICE, LifecycleEvent::Completed))
            .unwrap();
        assert!(second.await.is_ok());
    }

    #[tokio::test]
    async fn test_abort_is_two_phase() {
        let mut engine = MockDfuEngine::new();
        engine
            .expect_start()
            .returning(|_| Ok(handle_with_abort(true, true)));
        let h = spawn_with(engine, DfuOptions::default());

        let session = h.handle.start_dfu(RequestBuilder::new().build());
        assert_eq!(h.handle.abort_dfu().await, Ok(()));
        // Engine has not confirmed yet
        assert!(h.handle.is_running().await);

        h.engine_events
            .send(EngineEvent::anonymous(LifecycleEvent::Aborted))
            .unwrap();
        assert_eq!(session.await, Ok(DfuOutcome::Aborted));
    }

    #[tokio::test]
    async fn test_abort_without_session() {
        let h = spawn_with(engine_with_handle(0), DfuOptions::default());

        let rejection = h.handle.abort_dfu().await.unwrap_err();

        assert_eq!(rejection.code, "no_running_dfu");
        assert!(!h.handle.is_running().await);
    }

    #[tokio::test]
    async fn test_defaults_fill_unset_options() {
        let mut engine = MockDfuEngine::new();
        engine
            .expect_start()
            .times(1)
            .withf(|options| {
                options.number_of_retries == Some(5)
                    && options.connection_timeout == std::time::Duration::from_secs(20)
            })
            .returning(|_| Ok(idle_handle()));
        let defaults = DfuOptions {
            number_of_retries: Some(5),
            connection_timeout_secs: Some(30),
            ..Default::default()
        };
        let h = spawn_with(engine, defaults);

        let _session = h
            .handle
            .start_dfu(RequestBuilder::new().connection_timeout_secs(20).build());

        assert!(h.handle.is_running().await);
    }

    #[tokio::test]
    async fn test_service_uses_loaded_settings() {
        let ctx = TestContext::new();
        ctx.create_file(
            "dfu_settings.json",
            r#"{ "addressPolicy": "uuid", "defaultOptions": { "numberOfRetries": 2 } }"#,
        );
        let settings = SettingsManager::new(ctx.root()).load().unwrap();

        let mut engine = MockDfuEngine::new();
        engine
            .expect_start()
            .times(1)
            .withf(|options| {
                options.device.uuid().is_some() && options.number_of_retries == Some(2)
            })
            .returning(|_| Ok(idle_handle()));
        let h = spawn_with_settings(engine, &settings);

        let rejected = h.handle.start_dfu(RequestBuilder::new().build()).await;
        assert_eq!(rejected.unwrap_err().code, "invalid_device_address");

        let _session = h.handle.start_dfu(
            RequestBuilder::new()
                .device("E621E1F8-C36C-495A-93FC-0C247A3E6E5F")
                .build(),
        );
        assert!(h.handle.is_running().await);
    }

    #[tokio::test]
    async fn test_custom_policy_service() {
        let (_engine_events, events) = engine_event_channel();
        let (emitter, _outbound) = mpsc::unbounded_channel();
        let handle = spawn_dfu_service_with_policy(
            engine_with_handle(1),
            events,
            emitter,
            AddressPolicy::Custom(Arc::new(|raw: &str| raw.starts_with("DFU-"))),
            DfuOptions::default(),
        );

        let rejected = handle.start_dfu(RequestBuilder::new().build()).await;
        assert_eq!(rejected.unwrap_err().code, "invalid_device_address");

        let _session = handle.start_dfu(RequestBuilder::new().device("DFU-01").build());
        assert_eq!(
            handle.current_device_address().await.as_deref(),
            Some("DFU-01")
        );
    }

    #[tokio::test]
    async fn test_pending_session_rejected_when_service_stops() {
        let h = spawn_with(engine_with_handle(1), DfuOptions::default());

        let session = h.handle.start_dfu(RequestBuilder::new().build());
        drop(h.handle);

        assert_eq!(session.await.unwrap_err().code, "dfu_service_stopped");
    }
}
