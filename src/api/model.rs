//! This module defines the read only API for interacting with the monitor models.
//! It provides interfaces for accessing the reconciled reading, the per-stream
//! history, the alert list and the live channel state, plus the snapshot type
//! handed to rendering consumers.
use serde::Serialize;
use std::fmt::Debug;

use crate::model::{
    alerts::{Alert, AlertLog},
    command::CommandStatus,
    history::HistoryBuffer,
    telemetry::{FluidSample, Reading, VitalsSample},
};

/// `MonitorModelApi` trait.
///
/// Read access to the state owned by the reconciler.
pub trait MonitorModelApi: Debug + Send + Sync {
    /// Retrieves the reconciled current reading.
    fn get_reading(&self) -> &Reading;

    /// Retrieves the fast-stream history, oldest first.
    fn get_fluid_history(&self) -> &HistoryBuffer<FluidSample>;

    /// Retrieves the slow-stream history, oldest first.
    fn get_vitals_history(&self) -> &HistoryBuffer<VitalsSample>;

    /// Retrieves the alert list, most recent first.
    fn get_alerts(&self) -> &AlertLog;

    /// Retrieves the last accepted slow-stream sample, if any.
    fn get_last_vitals(&self) -> Option<&VitalsSample>;
}

/// Internal state of the live channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt made yet, or torn down.
    #[default]
    Idle,
    Connected,
    Disconnected,
}

/// Connection indicator exposed to consumers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
}

impl From<ConnectionState> for ConnectionStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => ConnectionStatus::Connected,
            ConnectionState::Idle | ConnectionState::Disconnected => ConnectionStatus::Disconnected,
        }
    }
}

pub trait ConnectionModelApi: Debug + Send + Sync {
    /// Gets the state machine's current state.
    fn get_state(&self) -> ConnectionState;

    /// Gets the consumer-facing connection indicator.
    fn get_status(&self) -> ConnectionStatus {
        self.get_state().into()
    }

    /// Identifier of the channel instance whose events are currently accepted.
    fn get_generation(&self) -> u64;
}

/// Read-only copy of everything a renderer needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub reading: Reading,
    pub fluid_history: Vec<FluidSample>,
    pub vitals_history: Vec<VitalsSample>,
    pub alerts: Vec<Alert>,
    pub connection: ConnectionStatus,
    pub last_command: Option<CommandStatus>,
}

impl MonitorSnapshot {
    pub fn capture<M: MonitorModelApi + ?Sized>(
        model: &M,
        connection: ConnectionStatus,
        last_command: Option<CommandStatus>,
    ) -> Self {
        Self {
            reading: model.get_reading().clone(),
            fluid_history: model.get_fluid_history().to_vec(),
            vitals_history: model.get_vitals_history().to_vec(),
            alerts: model.get_alerts().to_vec(),
            connection,
            last_command,
        }
    }
}
