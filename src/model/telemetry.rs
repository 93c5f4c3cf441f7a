//! Telemetry Model
//!
//! This module defines the measurement types exchanged with the monitoring service:
//! - fast-stream samples (IV fluid weight and backup pump state)
//! - slow-stream samples (averaged heart rate and oxygen saturation)
//! - the reconciled `Reading` combining the latest value of both streams
//!
//! Field names follow the service's wire format; the English names are accepted as aliases.

use crate::core::constants::{FULL_BAG_GRAMS, INITIAL_FLUID_STATE, NO_SIGNAL_VITALS_STATE};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// One fast-stream measurement, also kept as a fluid history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluidSample {
    /// Row identifier assigned by the service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Time the sample was produced.
    #[serde(default, with = "timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    /// Remaining IV fluid in grams.
    #[serde(rename = "peso", alias = "weight", alias = "fluidWeight")]
    pub weight: f64,
    /// `true` while the backup infusion pump runs.
    #[serde(rename = "bomba", alias = "pumpActive", default)]
    pub pump_active: bool,
    /// Status string computed by the sensor node.
    #[serde(
        rename = "estado_suero",
        alias = "fluidState",
        default = "initial_fluid_state"
    )]
    pub fluid_state: String,
}

/// One slow-stream measurement, also kept as a vitals history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalsSample {
    /// Row identifier assigned by the service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Time the average was produced.
    #[serde(default, with = "timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    /// Averaged heart rate in beats per minute, 0 without finger contact.
    #[serde(
        rename = "fc",
        alias = "heartRate",
        default,
        deserialize_with = "vital_sign::deserialize"
    )]
    pub heart_rate: u32,
    /// Averaged oxygen saturation in percent, 0 without finger contact.
    #[serde(
        rename = "spo2",
        alias = "oxygenSaturation",
        default,
        deserialize_with = "vital_sign::deserialize"
    )]
    pub oxygen_saturation: u32,
    /// Status string computed by the sensor node.
    #[serde(
        rename = "estado_vitales",
        alias = "vitalsState",
        default = "no_signal_vitals_state"
    )]
    pub vitals_state: String,
}

impl VitalsSample {
    /// Whether the optical sensor had contact during the averaging window.
    pub fn has_signal(&self) -> bool {
        self.heart_rate > 0
    }
}

/// The reconciled current state of both streams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, with = "timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(rename = "fc")]
    pub heart_rate: u32,
    #[serde(rename = "spo2")]
    pub oxygen_saturation: u32,
    #[serde(rename = "peso")]
    pub fluid_weight: f64,
    #[serde(rename = "bomba")]
    pub pump_active: bool,
    #[serde(rename = "estado_suero")]
    pub fluid_state: String,
    #[serde(rename = "estado_vitales")]
    pub vitals_state: String,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            timestamp: None,
            heart_rate: 0,
            oxygen_saturation: 0,
            fluid_weight: FULL_BAG_GRAMS,
            pump_active: false,
            fluid_state: initial_fluid_state(),
            vitals_state: no_signal_vitals_state(),
        }
    }
}

impl Reading {
    /// Overwrites the fast-stream fields.
    pub fn apply_fluid(&mut self, sample: &FluidSample) {
        self.fluid_weight = sample.weight;
        self.pump_active = sample.pump_active;
        self.fluid_state = sample.fluid_state.clone();
        self.timestamp = sample.timestamp;
    }

    /// Overwrites the slow-stream fields.
    pub fn apply_vitals(&mut self, sample: &VitalsSample) {
        self.heart_rate = sample.heart_rate;
        self.oxygen_saturation = sample.oxygen_saturation;
        self.vitals_state = sample.vitals_state.clone();
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HR {} bpm | SpO2 {}% | IV {:.1} g | pump {} | fluid {} | vitals {}",
            self.heart_rate,
            self.oxygen_saturation,
            self.fluid_weight,
            if self.pump_active { "ON" } else { "off" },
            self.fluid_state,
            self.vitals_state
        )
    }
}

fn initial_fluid_state() -> String {
    INITIAL_FLUID_STATE.to_owned()
}

fn no_signal_vitals_state() -> String {
    NO_SIGNAL_VITALS_STATE.to_owned()
}

/// Optional timestamp codec.
///
/// Writes RFC 3339. Reads RFC 3339 or an ISO 8601 date-time without offset,
/// which the service emits for its UTC timestamps.
pub mod timestamp {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::{
        format_description::well_known::{Iso8601, Rfc3339},
        OffsetDateTime, PrimitiveDateTime,
    };

    pub fn parse(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).or_else(|_| {
            PrimitiveDateTime::parse(value, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc)
        })
    }

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => {
                let text = ts.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) if !text.is_empty() => parse(&text).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

/// Averaged vital sign reader.
///
/// Accepts integers and floats, the latter rounded to the nearest unit. `null`,
/// negative and non-finite values read as 0, the no-signal value.
pub mod vital_sign {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<f64>::deserialize(deserializer)? {
            Some(value) if value.is_finite() && value > 0.0 => {
                value.round().min(u32::MAX as f64) as u32
            }
            _ => 0,
        })
    }
}
