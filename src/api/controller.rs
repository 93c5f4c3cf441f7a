//! Controller Module
//!
//! This module defines the traits for mutating the monitor state and for talking
//! to the monitoring service: applying telemetry, driving the live channel, and
//! issuing request/response calls.
use crate::core::events::ChannelEvent;
use crate::model::{
    alerts::Alert,
    command::{CommandAck, PumpCommand},
    report::EmailReport,
    telemetry::{FluidSample, VitalsSample},
};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::model::{ConnectionModelApi, MonitorModelApi};

/// TelemetryApi trait
///
/// The accept-paths of the reconciler. This is the only way the reading, the
/// history buffers and the alert list are mutated.
pub trait TelemetryApi: MonitorModelApi {
    /// Apply a fast-stream sample.
    ///
    /// Overwrites weight, pump flag, fluid status and timestamp; the vitals are
    /// carried forward from the last accepted slow-stream sample.
    fn apply_fluid(&mut self, sample: FluidSample);

    /// Apply a slow-stream sample.
    ///
    /// # Returns
    ///
    /// `false` if the sample was rejected because it carries no heart rate.
    fn apply_vitals(&mut self, sample: VitalsSample) -> bool;

    /// Merge an alert batch pushed by the service.
    fn merge_alerts(&mut self, alerts: Vec<Alert>);

    /// Empty the alert list.
    fn clear_alerts(&mut self);

    /// Seed the fast-stream history from a bootstrap fetch (oldest first).
    fn seed_fluid_history(&mut self, history: Vec<FluidSample>);

    /// Seed the slow-stream history from a bootstrap fetch (oldest first).
    fn seed_vitals_history(&mut self, history: Vec<VitalsSample>);

    /// Seed the alert list from a bootstrap fetch (most recent first).
    fn seed_alerts(&mut self, alerts: Vec<Alert>);

    /// Restore the initial state.
    fn reset(&mut self);
}

/// ConnectionApi trait
///
/// Lifecycle of the live channel. Events produced by channel instances come back
/// through the event bus and are fed to `on_channel_event` in delivery order.
pub trait ConnectionApi: ConnectionModelApi {
    /// Open a new channel instance, superseding any previous one.
    fn connect(&mut self) -> Result<()>;

    /// Close the active channel and cancel any pending reconnection.
    fn disconnect(&mut self);

    /// Advance the state machine.
    ///
    /// # Returns
    ///
    /// The frame payload if `event` is a frame of the current instance.
    fn on_channel_event(&mut self, event: ChannelEvent) -> Option<String>;
}

/// Inbound text frames of one channel instance. The stream ends when the
/// channel closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// ChannelFactory trait
///
/// Opens live channel instances.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Open a channel to `url`.
    async fn open(&self, url: &str) -> Result<FrameStream>;
}

/// BackendApi trait
///
/// Request/response calls against the monitoring service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /suero?limit=N`, oldest first.
    async fn fetch_fluid_history(&self, limit: usize) -> Result<Vec<FluidSample>>;

    /// `GET /vitales?limit=N`, oldest first.
    async fn fetch_vitals_history(&self, limit: usize) -> Result<Vec<VitalsSample>>;

    /// `GET /alertas?limit=N`, most recent first.
    async fn fetch_alerts(&self, limit: usize) -> Result<Vec<Alert>>;

    /// `DELETE /alertas`.
    async fn clear_alerts(&self) -> Result<()>;

    /// `POST /comandos`.
    async fn send_command(&self, command: PumpCommand) -> Result<CommandAck>;

    /// `POST /enviar-email`.
    async fn send_report(&self, report: &EmailReport) -> Result<()>;
}
