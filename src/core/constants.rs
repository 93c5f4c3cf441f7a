use std::time::Duration;

/// Base address of the monitoring service when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Path of the live channel, appended to the upgraded base address.
pub const LIVE_CHANNEL_PATH: &str = "/ws";

/// Fast-stream (IV fluid) history endpoint.
pub const FLUID_HISTORY_PATH: &str = "/suero";
/// Slow-stream (vitals) history endpoint.
pub const VITALS_HISTORY_PATH: &str = "/vitales";
/// Alert list endpoint, `GET` to read, `DELETE` to clear.
pub const ALERTS_PATH: &str = "/alertas";
/// Pump command endpoint.
pub const COMMANDS_PATH: &str = "/comandos";
/// Email report endpoint.
pub const EMAIL_PATH: &str = "/enviar-email";

/// Entries requested per stream during bootstrap.
pub const DEFAULT_HISTORY_LIMIT: usize = 60;
/// Alerts requested during bootstrap.
pub const DEFAULT_ALERT_LIMIT: usize = 20;
/// Retained entries per history buffer.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;
/// Retained alerts.
pub const DEFAULT_ALERT_CAPACITY: usize = 50;

/// Timeout of a single request/response call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the live channel handshake.
pub const CHANNEL_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
/// Silence after which an open live channel is considered dead.
///
/// The service sends a keep-alive every 30 s, so this is two missed keep-alives.
pub const CHANNEL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Flat delay between a channel close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Interval between simulated fast-stream frames.
pub const SIMULATION_TICK: Duration = Duration::from_secs(1);
/// Simulated fast-stream frames per slow-stream frame.
pub const SIMULATION_VITALS_EVERY: u32 = 10;
/// Fluid weight below which the simulated backup pump runs.
pub const SIMULATION_PUMP_BELOW_GRAMS: f64 = 100.0;

// Clinical thresholds.
pub const HEART_RATE_LOW_BPM: u32 = 60;
pub const HEART_RATE_HIGH_BPM: u32 = 100;
pub const SPO2_CRITICAL_PERCENT: u32 = 90;
pub const SPO2_LOW_PERCENT: u32 = 95;
pub const FLUID_CRITICAL_GRAMS: f64 = 50.0;

/// Weight of a full IV bag, used for the initial reading.
pub const FULL_BAG_GRAMS: f64 = 500.0;
/// Status echoed for the fluid line before any reading arrives.
pub const INITIAL_FLUID_STATE: &str = "NORMAL";
/// Status echoed for vitals while the optical sensor has not produced an average.
pub const NO_SIGNAL_VITALS_STATE: &str = "MIDIENDO";
