//! Pump Command Model
//!
//! Commands relayed by the service to the sensor node, and the outcome shown
//! to the user after issuing one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A command for the backup infusion pump.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpCommand {
    #[serde(rename = "bomba_on")]
    On,
    #[serde(rename = "bomba_off")]
    Off,
    #[serde(rename = "reset")]
    Reset,
}

impl PumpCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpCommand::On => "bomba_on",
            PumpCommand::Off => "bomba_off",
            PumpCommand::Reset => "reset",
        }
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PumpCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" | "bomba_on" => Ok(PumpCommand::On),
            "off" | "bomba_off" => Ok(PumpCommand::Off),
            "reset" => Ok(PumpCommand::Reset),
            other => Err(anyhow::anyhow!("unknown pump command `{}`", other)),
        }
    }
}

/// Request body of `POST /comandos`.
#[derive(Clone, Debug, Serialize)]
pub struct CommandRequest {
    pub cmd: PumpCommand,
}

/// Service acknowledgement of a command.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub ok: bool,
    pub cmd: Option<String>,
    pub timestamp: Option<String>,
}

/// Result of the last command, kept for display until the next one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CommandOutcome {
    Pending,
    Accepted,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandStatus {
    pub command: PumpCommand,
    pub outcome: CommandOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let body = serde_json::to_string(&CommandRequest {
            cmd: PumpCommand::On,
        })
        .unwrap();
        assert_eq!(body, r#"{"cmd":"bomba_on"}"#);
    }

    #[test]
    fn test_parse() {
        assert_eq!("off".parse::<PumpCommand>().unwrap(), PumpCommand::Off);
        assert_eq!("reset".parse::<PumpCommand>().unwrap(), PumpCommand::Reset);
        assert!("purge".parse::<PumpCommand>().is_err());
    }

    #[test]
    fn test_ack() {
        let ack: CommandAck = serde_json::from_str(
            r#"{"ok":true,"cmd":"bomba_off","timestamp":"2026-03-01T10:00:00"}"#,
        )
        .unwrap();
        assert!(ack.ok);
        assert_eq!(ack.cmd.as_deref(), Some("bomba_off"));
    }
}
