//! Alert Model
//!
//! This module defines alert records and the threshold engine producing them.
//! Alerts are either synthesized locally from a reconciled `Reading` or pushed
//! by the monitoring service in batches. Both kinds share one capped list,
//! most recent first.

use super::telemetry::{timestamp, Reading};
use crate::core::{
    config::AlertPolicy,
    constants::{
        FLUID_CRITICAL_GRAMS, HEART_RATE_HIGH_BPM, HEART_RATE_LOW_BPM, SPO2_CRITICAL_PERCENT,
        SPO2_LOW_PERCENT,
    },
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::VecDeque, fmt};
use time::OffsetDateTime;

/// Alert severity, serialized as `ok`, `warn` or `critical`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warn,
    Critical,
}

impl Severity {
    /// Severity for a service alert code when the payload carries none.
    pub fn from_code(code: &str) -> Self {
        match code {
            "SUERO_CRITICO" | "SPO2_CRITICA" => Severity::Critical,
            _ => Severity::Warn,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "OK"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Where an alert came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOrigin {
    Local,
    Remote,
}

/// Threshold conditions evaluated against every accepted reading.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AlertKind {
    LowHeartRate,
    HighHeartRate,
    CriticalSpo2,
    LowSpo2,
    BackupPumpActive,
    CriticalFluidLevel,
}

impl AlertKind {
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::CriticalSpo2 | AlertKind::CriticalFluidLevel => Severity::Critical,
            _ => Severity::Warn,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::LowHeartRate => "low heart rate",
            AlertKind::HighHeartRate => "high heart rate",
            AlertKind::CriticalSpo2 => "critical SpO2",
            AlertKind::LowSpo2 => "low SpO2",
            AlertKind::BackupPumpActive => "backup pump active",
            AlertKind::CriticalFluidLevel => "critical IV fluid level",
        }
    }

    /// Code shared with the service's alert table.
    pub fn code(&self) -> &'static str {
        match self {
            AlertKind::LowHeartRate => "FC_BAJA",
            AlertKind::HighHeartRate => "FC_ALTA",
            AlertKind::CriticalSpo2 => "SPO2_CRITICA",
            AlertKind::LowSpo2 => "SPO2_BAJA",
            AlertKind::BackupPumpActive => "BOMBA_ON",
            AlertKind::CriticalFluidLevel => "SUERO_CRITICO",
        }
    }

    fn describe(&self, reading: &Reading) -> String {
        match self {
            AlertKind::LowHeartRate | AlertKind::HighHeartRate => {
                format!("{}: {} bpm", self.label(), reading.heart_rate)
            }
            AlertKind::CriticalSpo2 | AlertKind::LowSpo2 => {
                format!("{}: {}%", self.label(), reading.oxygen_saturation)
            }
            AlertKind::BackupPumpActive => self.label().to_owned(),
            AlertKind::CriticalFluidLevel => {
                format!("{}: {:.1} g", self.label(), reading.fluid_weight)
            }
        }
    }
}

/// Evaluates the clinical thresholds against a reading.
///
/// Heart rate and SpO2 are only checked once they carry a measured value (> 0).
pub fn evaluate(reading: &Reading) -> Vec<AlertKind> {
    let mut kinds = Vec::new();
    if reading.heart_rate > 0 {
        if reading.heart_rate < HEART_RATE_LOW_BPM {
            kinds.push(AlertKind::LowHeartRate);
        } else if reading.heart_rate > HEART_RATE_HIGH_BPM {
            kinds.push(AlertKind::HighHeartRate);
        }
    }
    if reading.oxygen_saturation > 0 {
        if reading.oxygen_saturation < SPO2_CRITICAL_PERCENT {
            kinds.push(AlertKind::CriticalSpo2);
        } else if reading.oxygen_saturation < SPO2_LOW_PERCENT {
            kinds.push(AlertKind::LowSpo2);
        }
    }
    if reading.fluid_weight < FLUID_CRITICAL_GRAMS {
        kinds.push(AlertKind::CriticalFluidLevel);
    }
    if reading.pump_active {
        kinds.push(AlertKind::BackupPumpActive);
    }
    kinds
}

/// A generated or received alert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub id: u64,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(rename = "tipo", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: Option<OffsetDateTime>,
    pub origin: AlertOrigin,
}

impl Alert {
    /// Builds a locally synthesized alert for `kind`.
    pub fn local(id: u64, kind: AlertKind, reading: &Reading) -> Self {
        Self {
            id,
            message: kind.describe(reading),
            severity: kind.severity(),
            code: Some(kind.code().to_owned()),
            timestamp: Some(reading.timestamp.unwrap_or_else(OffsetDateTime::now_utc)),
            origin: AlertOrigin::Local,
        }
    }
}

impl<'de> Deserialize<'de> for Alert {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Accepts both the dashboard shape (`msg`, `type`) and the service table
        // shape (`mensaje`, `tipo`).
        #[derive(Deserialize)]
        struct AlertHelper {
            id: u64,
            #[serde(alias = "msg", alias = "mensaje", default)]
            message: Option<String>,
            #[serde(rename = "type", alias = "severity", default)]
            severity: Option<Severity>,
            #[serde(rename = "tipo", default)]
            code: Option<String>,
            #[serde(default, with = "timestamp")]
            timestamp: Option<OffsetDateTime>,
        }
        let helper = AlertHelper::deserialize(deserializer)?;

        let severity = helper.severity.unwrap_or_else(|| {
            helper
                .code
                .as_deref()
                .map(Severity::from_code)
                .unwrap_or(Severity::Warn)
        });
        let message = helper
            .message
            .or_else(|| helper.code.clone())
            .unwrap_or_default();

        Ok(Alert {
            id: helper.id,
            message,
            severity,
            code: helper.code,
            timestamp: helper.timestamp,
            origin: AlertOrigin::Remote,
        })
    }
}

/// Capped alert list, most recent first. Overflow evicts from the tail.
#[derive(Clone, Debug)]
pub struct AlertLog {
    capacity: usize,
    entries: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Puts a batch of new alerts at the head, keeping the batch's own order.
    pub fn prepend(&mut self, batch: Vec<Alert>) {
        for alert in batch.into_iter().rev() {
            self.entries.push_front(alert);
        }
        self.entries.truncate(self.capacity);
    }

    /// Adds alerts older than every listed one at the tail, as long as room remains.
    pub fn append_older(&mut self, batch: Vec<Alert>) {
        self.entries.extend(batch);
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }
}

/// Hands out unique, time-derived, strictly increasing alert ids.
#[derive(Debug, Default, Clone)]
pub struct AlertIdSource {
    last: u64,
}

impl AlertIdSource {
    pub fn next_id(&mut self) -> u64 {
        let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64;
        self.last = now_ms.max(self.last + 1);
        self.last
    }
}

/// Turns threshold breaches into alert records according to the configured policy.
#[derive(Debug, Clone)]
pub struct AlertEngine {
    policy: AlertPolicy,
    ids: AlertIdSource,
    active: Vec<AlertKind>,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            ids: AlertIdSource::default(),
            active: Vec::new(),
        }
    }

    /// Evaluates `reading` and returns the alerts to record, in evaluation order.
    pub fn process(&mut self, reading: &Reading) -> Vec<Alert> {
        let kinds = evaluate(reading);
        let emitted: Vec<AlertKind> = match self.policy {
            AlertPolicy::EveryReading => kinds.clone(),
            AlertPolicy::OnTransition => kinds
                .iter()
                .copied()
                .filter(|kind| !self.active.contains(kind))
                .collect(),
        };
        self.active = kinds;
        emitted
            .into_iter()
            .map(|kind| Alert::local(self.ids.next_id(), kind, reading))
            .collect()
    }

    /// Forgets which conditions were active.
    pub fn reset(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(hr: u32, spo2: u32, weight: f64, pump: bool) -> Reading {
        Reading {
            heart_rate: hr,
            oxygen_saturation: spo2,
            fluid_weight: weight,
            pump_active: pump,
            ..Reading::default()
        }
    }

    fn remote(id: u64) -> Alert {
        Alert {
            id,
            message: format!("alert {}", id),
            severity: Severity::Warn,
            code: None,
            timestamp: None,
            origin: AlertOrigin::Remote,
        }
    }

    #[test]
    fn test_high_heart_rate_only() {
        let kinds = evaluate(&reading(105, 97, 480.0, false));
        assert_eq!(kinds, vec![AlertKind::HighHeartRate]);
        assert_eq!(kinds[0].severity(), Severity::Warn);
        assert_eq!(kinds[0].label(), "high heart rate");
    }

    #[test]
    fn test_low_fluid_and_pump() {
        assert_eq!(
            evaluate(&reading(80, 97, 40.0, true)),
            vec![AlertKind::CriticalFluidLevel, AlertKind::BackupPumpActive]
        );
        assert_eq!(AlertKind::CriticalFluidLevel.severity(), Severity::Critical);
        assert_eq!(AlertKind::BackupPumpActive.severity(), Severity::Warn);
    }

    #[test]
    fn test_spo2_bands() {
        assert_eq!(
            evaluate(&reading(70, 89, 480.0, false)),
            vec![AlertKind::CriticalSpo2]
        );
        assert_eq!(
            evaluate(&reading(70, 90, 480.0, false)),
            vec![AlertKind::LowSpo2]
        );
        assert_eq!(
            evaluate(&reading(70, 94, 480.0, false)),
            vec![AlertKind::LowSpo2]
        );
        assert!(evaluate(&reading(70, 95, 480.0, false)).is_empty());
    }

    #[test]
    fn test_heart_rate_bounds_are_exclusive() {
        assert!(evaluate(&reading(60, 97, 480.0, false)).is_empty());
        assert!(evaluate(&reading(100, 97, 480.0, false)).is_empty());
        assert_eq!(
            evaluate(&reading(59, 97, 480.0, false)),
            vec![AlertKind::LowHeartRate]
        );
    }

    #[test]
    fn test_unmeasured_vitals_do_not_alert() {
        assert!(evaluate(&Reading::default()).is_empty());
    }

    #[test]
    fn test_local_alert_record() {
        let r = reading(105, 97, 480.0, false);
        let alert = Alert::local(1, AlertKind::HighHeartRate, &r);
        assert_eq!(alert.severity, Severity::Warn);
        assert!(alert.message.starts_with("high heart rate"));
        assert_eq!(alert.code.as_deref(), Some("FC_ALTA"));
        assert_eq!(alert.origin, AlertOrigin::Local);
    }

    #[test]
    fn test_log_capacity_keeps_most_recent_first() {
        let mut log = AlertLog::new(20);
        for id in 0..30 {
            log.prepend(vec![remote(id)]);
        }
        assert_eq!(log.len(), 20);
        let ids: Vec<u64> = log.iter().map(|a| a.id).collect();
        assert_eq!(ids, (10..30).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_keeps_its_order() {
        let mut log = AlertLog::new(5);
        log.prepend(vec![remote(1)]);
        log.prepend(vec![remote(2), remote(3)]);
        let ids: Vec<u64> = log.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_append_older_respects_capacity() {
        let mut log = AlertLog::new(3);
        log.prepend(vec![remote(10)]);
        log.append_older(vec![remote(3), remote(2), remote(1)]);
        let ids: Vec<u64> = log.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![10, 3, 2]);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_deserialize_service_alert() {
        let json = r#"{"id":12,"timestamp":"2026-03-01T10:00:00","time":"10:00:00",
            "tipo":"SUERO_CRITICO","mensaje":"Nivel critico de suero","valor":42.0,"activa":true}"#;
        let alert: Alert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.id, 12);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.message, "Nivel critico de suero");
        assert_eq!(alert.origin, AlertOrigin::Remote);
    }

    #[test]
    fn test_deserialize_dashboard_alert() {
        let alert: Alert =
            serde_json::from_str(r#"{"id":3,"msg":"low SpO2","type":"warn"}"#).unwrap();
        assert_eq!(alert.severity, Severity::Warn);
        assert_eq!(alert.message, "low SpO2");
        assert!(alert.code.is_none());
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = AlertIdSource::default();
        let a = ids.next_id();
        let b = ids.next_id();
        let c = ids.next_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_engine_every_reading() {
        let mut engine = AlertEngine::new(AlertPolicy::EveryReading);
        let r = reading(80, 97, 480.0, true);
        assert_eq!(engine.process(&r).len(), 1);
        assert_eq!(engine.process(&r).len(), 1);
    }

    #[test]
    fn test_engine_on_transition() {
        let mut engine = AlertEngine::new(AlertPolicy::OnTransition);
        let pumping = reading(80, 97, 480.0, true);
        assert_eq!(engine.process(&pumping).len(), 1);
        assert!(engine.process(&pumping).is_empty());
        assert!(engine.process(&reading(80, 97, 480.0, false)).is_empty());
        assert_eq!(engine.process(&pumping).len(), 1);
    }
}
