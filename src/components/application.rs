//! Application Component
//!
//! `MonitorController` is the single consumer of the event bus: it owns the
//! reconciled state and the live channel, applies events one at a time in
//! delivery order, and publishes a snapshot after each of them.
//! `MonitorClient` is the handle given to the rendering layer.
use crate::{
    api::{
        controller::{BackendApi, ChannelFactory, ConnectionApi, TelemetryApi},
        model::MonitorSnapshot,
    },
    components::{
        backend::{HttpBackend, WebSocketFactory},
        bootstrap::spawn_bootstrap,
        connection::ConnectionComponent,
        monitor::MonitorState,
        simulation::SimulatedChannelFactory,
    },
    core::{
        config::MonitorConfig,
        events::{AppEvent, UserEvent},
    },
    model::{
        command::{CommandOutcome, CommandStatus, PumpCommand},
        frame::Frame,
        report::EmailReport,
    },
};
use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        watch,
    },
    task::JoinHandle,
};

/// Event loop of one client instance.
pub struct MonitorController<T: TelemetryApi, C: ConnectionApi, B: BackendApi + 'static> {
    config: MonitorConfig,
    state: T,
    connection: C,
    backend: Arc<B>,
    event_bus: UnboundedSender<AppEvent>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    last_command: Option<CommandStatus>,
}

impl<T: TelemetryApi, C: ConnectionApi, B: BackendApi + 'static> MonitorController<T, C, B> {
    /// Creates a new `MonitorController`.
    ///
    /// # Returns
    /// The controller and the receiving side of its snapshot channel.
    pub fn new(
        config: MonitorConfig,
        state: T,
        connection: C,
        backend: Arc<B>,
        event_bus: UnboundedSender<AppEvent>,
    ) -> (Self, watch::Receiver<MonitorSnapshot>) {
        trace!("Initializing MonitorController.");
        let initial = MonitorSnapshot::capture(&state, connection.get_status(), None);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        (
            Self {
                config,
                state,
                connection,
                backend,
                event_bus,
                snapshot_tx,
                last_command: None,
            },
            snapshot_rx,
        )
    }

    /// Demultiplexes one inbound frame. Unusable frames are dropped.
    fn handle_frame(&mut self, payload: &str) {
        match Frame::decode(payload) {
            Ok(Frame::Fluid(sample)) => self.state.apply_fluid(sample),
            Ok(Frame::Vitals(sample)) => {
                self.state.apply_vitals(sample);
            }
            Ok(Frame::Alerts(alerts)) => self.state.merge_alerts(alerts),
            Ok(Frame::KeepAlive) => trace!("keep-alive received"),
            Err(e) => debug!("dropping frame: {}", e),
        }
    }

    fn handle_user_event(&mut self, event: UserEvent) -> Result<()> {
        match event {
            UserEvent::ClearAlerts => {
                self.state.clear_alerts();
                if self.config.propagate_clear {
                    let backend = self.backend.clone();
                    tokio::spawn(async move {
                        if let Err(e) = backend.clear_alerts().await {
                            warn!("could not clear service alerts: {}", e);
                        }
                    });
                }
            }
            UserEvent::PumpCommand(command) => {
                info!("sending pump command {}", command);
                self.last_command = Some(CommandStatus {
                    command,
                    outcome: CommandOutcome::Pending,
                });
                let backend = self.backend.clone();
                let event_bus = self.event_bus.clone();
                tokio::spawn(async move {
                    let outcome = match backend.send_command(command).await {
                        Ok(_) => CommandOutcome::Accepted,
                        Err(e) => CommandOutcome::Failed(e.to_string()),
                    };
                    let _ = event_bus.send(AppEvent::CommandFinished(CommandStatus {
                        command,
                        outcome,
                    }));
                });
            }
            UserEvent::SendReport { recipient } => {
                if recipient.trim().is_empty() {
                    return Err(anyhow!("report recipient is empty"));
                }
                let report = EmailReport {
                    recipient,
                    payload: self.state.get_reading().clone(),
                    alerts: self.state.get_alerts().to_vec(),
                };
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    match backend.send_report(&report).await {
                        Ok(()) => info!("report sent to {}", report.recipient),
                        Err(e) => warn!("could not send report to {}: {}", report.recipient, e),
                    }
                });
            }
            UserEvent::Reset => {
                self.state.reset();
                self.last_command = None;
            }
        }
        Ok(())
    }

    /// Dispatches application-level events to the owning component.
    fn dispatch_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Channel(event) => {
                if let Some(payload) = self.connection.on_channel_event(event) {
                    self.handle_frame(&payload);
                }
                Ok(())
            }
            AppEvent::Bootstrap(event) => {
                event.forward_to(&mut self.state);
                Ok(())
            }
            AppEvent::User(event) => self.handle_user_event(event),
            AppEvent::CommandFinished(status) => {
                match &status.outcome {
                    CommandOutcome::Failed(reason) => {
                        warn!("pump command {} failed: {}", status.command, reason)
                    }
                    _ => info!("pump command {} accepted", status.command),
                }
                self.last_command = Some(status);
                Ok(())
            }
            AppEvent::Shutdown => {
                self.connection.disconnect();
                Ok(())
            }
        }
    }

    fn publish(&self) {
        let snapshot = MonitorSnapshot::capture(
            &self.state,
            self.connection.get_status(),
            self.last_command.clone(),
        );
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Asynchronous event handler.
    ///
    /// Opens the live channel, then processes events until `AppEvent::Shutdown`.
    pub async fn run(mut self, mut events: UnboundedReceiver<AppEvent>) {
        if let Err(e) = self.connection.connect() {
            error!("could not open live channel: {}", e);
        }
        while let Some(event) = events.recv().await {
            let shutdown = event == AppEvent::Shutdown;
            if let Err(e) = self.dispatch_event(event) {
                error!("error during event handling: {}", e);
            }
            self.publish();
            if shutdown {
                break;
            }
        }
        info!("monitor controller stopped");
    }
}

/// Handle to a running client instance.
///
/// Every instance owns its own state; dropping the handle tears the instance down.
#[derive(Debug)]
pub struct MonitorClient {
    event_bus: UnboundedSender<AppEvent>,
    snapshots: watch::Receiver<MonitorSnapshot>,
    controller_handle: Option<JoinHandle<()>>,
}

impl Drop for MonitorClient {
    fn drop(&mut self) {
        if self.controller_handle.is_some() {
            let _ = self.event_bus.send(AppEvent::Shutdown);
        }
    }
}

impl MonitorClient {
    /// Starts a client against the service at `config.base_url`.
    pub fn start(config: MonitorConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(config.api_base())?);
        Self::with_parts(config, backend, Arc::new(WebSocketFactory), true)
    }

    /// Starts a client fed by simulated telemetry. Commands and reports still go
    /// to the configured service; nothing is bootstrapped.
    pub fn simulated(config: MonitorConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(config.api_base())?);
        Self::with_parts(
            config,
            backend,
            Arc::new(SimulatedChannelFactory::default()),
            false,
        )
    }

    /// Starts a client on the given backend and channel factory.
    pub fn with_parts<B: BackendApi + 'static, F: ChannelFactory + 'static>(
        config: MonitorConfig,
        backend: Arc<B>,
        factory: Arc<F>,
        bootstrap: bool,
    ) -> Result<Self> {
        let url = config.live_url()?;
        let (event_bus, events) = mpsc::unbounded_channel();
        let connection =
            ConnectionComponent::new(factory, url, config.reconnect.clone(), event_bus.clone());
        let state = MonitorState::from_config(&config);
        if bootstrap {
            spawn_bootstrap(
                backend.clone(),
                config.history_limit,
                config.alert_limit,
                event_bus.clone(),
            );
        }
        let (controller, snapshots) =
            MonitorController::new(config, state, connection, backend, event_bus.clone());
        let controller_handle = tokio::spawn(controller.run(events));
        Ok(Self {
            event_bus,
            snapshots,
            controller_handle: Some(controller_handle),
        })
    }

    fn send(&self, event: AppEvent) -> Result<()> {
        self.event_bus
            .send(event)
            .map_err(|_| anyhow!("monitor client is shut down"))
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshots.clone()
    }

    pub fn clear_alerts(&self) -> Result<()> {
        self.send(AppEvent::User(UserEvent::ClearAlerts))
    }

    /// Issues a pump command; the outcome shows up as `last_command` in the snapshot.
    pub fn send_pump_command(&self, command: PumpCommand) -> Result<()> {
        self.send(AppEvent::User(UserEvent::PumpCommand(command)))
    }

    /// Emails the current reading and alerts to `recipient`.
    pub fn send_report(&self, recipient: impl Into<String>) -> Result<()> {
        self.send(AppEvent::User(UserEvent::SendReport {
            recipient: recipient.into(),
        }))
    }

    pub fn reset(&self) -> Result<()> {
        self.send(AppEvent::User(UserEvent::Reset))
    }

    /// Closes the live channel, cancels any pending reconnection and waits for
    /// the controller to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        self.send(AppEvent::Shutdown)?;
        if let Some(handle) = self.controller_handle.take() {
            handle.await?;
        }
        Ok(())
    }
}
