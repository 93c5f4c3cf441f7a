//! Bedside Monitor Client
//!
//! This crate keeps a live, reconciled view of a bedside IV-fluid and vital-sign
//! monitor. It bootstraps recent history from the monitoring service, follows the
//! live telemetry channel, merges the fast fluid stream with the slow vitals
//! stream, raises threshold alerts, and publishes read-only snapshots for a
//! rendering layer.

/// Traits separating read access from mutation.
pub mod api {
    /// Mutating traits and service adapters.
    pub mod controller;
    /// Read-only model traits and snapshots.
    pub mod model;
}

/// Core utilities used throughout the client.
pub mod core {
    /// Runtime configuration.
    pub mod config;
    /// Client-wide constants.
    pub mod constants;
    /// Event system for inter-component communication.
    pub mod events;
}

/// Data models representing the monitor's domain.
pub mod model {
    /// Alert records and the threshold engine.
    pub mod alerts;
    /// Pump commands and their outcome.
    pub mod command;
    /// Live channel frame decoding.
    pub mod frame;
    /// Bounded history buffers.
    pub mod history;
    /// Email report body.
    pub mod report;
    /// Telemetry samples and the reconciled reading.
    pub mod telemetry;
}

/// Components implementing the API traits.
pub mod components {
    /// Event loop and client handle.
    pub mod application;
    /// HTTP backend and WebSocket channel factory.
    pub mod backend;
    /// Startup history and alert loading.
    pub mod bootstrap;
    /// Live channel state machine.
    pub mod connection;
    /// Stream reconciliation.
    pub mod monitor;
    /// Simulated telemetry channel.
    pub mod simulation;
}

pub use crate::components::application::MonitorClient;
pub use crate::core::config::MonitorConfig;
