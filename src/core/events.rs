//! Core Events
//!
//! This module defines the events flowing over the monitor's event bus. All state
//! changes are driven by these events, consumed one at a time by the controller.
use crate::{
    api::controller::TelemetryApi,
    model::{
        alerts::Alert,
        command::{CommandStatus, PumpCommand},
        telemetry::{FluidSample, VitalsSample},
    },
};

/// Lifecycle events of live channel instances.
///
/// Each instance is tagged with the generation it was opened under; events of a
/// superseded generation are ignored.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// The instance finished its handshake.
    Opened { generation: u64 },
    /// A text frame arrived.
    Frame { generation: u64, payload: String },
    /// The instance closed.
    Closed { generation: u64 },
    /// The instance failed; treated as a close.
    Failed { generation: u64, reason: String },
    /// The reconnection delay scheduled after closing `generation` elapsed.
    ReconnectDue { generation: u64 },
}

/// Results of the bootstrap fetches, each delivered independently.
#[derive(Clone, Debug, PartialEq)]
pub enum BootstrapEvent {
    FluidHistory(Vec<FluidSample>),
    VitalsHistory(Vec<VitalsSample>),
    Alerts(Vec<Alert>),
}

impl BootstrapEvent {
    pub fn forward_to<T: TelemetryApi + ?Sized>(self, target: &mut T) {
        match self {
            BootstrapEvent::FluidHistory(history) => target.seed_fluid_history(history),
            BootstrapEvent::VitalsHistory(history) => target.seed_vitals_history(history),
            BootstrapEvent::Alerts(alerts) => target.seed_alerts(alerts),
        }
    }
}

/// Actions requested by the user.
#[derive(Clone, Debug, PartialEq)]
pub enum UserEvent {
    ClearAlerts,
    PumpCommand(PumpCommand),
    SendReport { recipient: String },
    Reset,
}

/// Enumeration of all application-level events.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    Channel(ChannelEvent),
    Bootstrap(BootstrapEvent),
    User(UserEvent),
    /// A pump command round-trip finished.
    CommandFinished(CommandStatus),
    /// Tear the client down.
    Shutdown,
}
