//! Monitor State
//!
//! The reconciler merging the two telemetry streams into one `Reading`.
//!
//! The fast stream (fluid weight, pump) arrives about once per second, the slow
//! stream (averaged heart rate and SpO2) about every ten seconds. The last
//! accepted slow-stream sample is kept on the side so that a fast-stream update
//! never drops the vitals, and a slow-stream sample without finger contact never
//! replaces a good one.
use crate::{
    api::{controller::TelemetryApi, model::MonitorModelApi},
    core::config::{AlertPolicy, MonitorConfig},
    model::{
        alerts::{Alert, AlertEngine, AlertLog},
        history::HistoryBuffer,
        telemetry::{FluidSample, Reading, VitalsSample},
    },
};
use log::{debug, trace};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct MonitorState {
    reading: Reading,
    /// Last accepted slow-stream sample. Written by the slow path, read by the fast path.
    last_vitals: Option<VitalsSample>,
    fluid_history: HistoryBuffer<FluidSample>,
    vitals_history: HistoryBuffer<VitalsSample>,
    alerts: AlertLog,
    engine: AlertEngine,
    /// Whether a live frame of the stream was applied; bootstrap data must not override it.
    live_fluid_seen: bool,
    live_vitals_seen: bool,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl MonitorState {
    pub fn new(history_capacity: usize, alert_capacity: usize, alert_policy: AlertPolicy) -> Self {
        Self {
            reading: Reading::default(),
            last_vitals: None,
            fluid_history: HistoryBuffer::new(history_capacity),
            vitals_history: HistoryBuffer::new(history_capacity),
            alerts: AlertLog::new(alert_capacity),
            engine: AlertEngine::new(alert_policy),
            live_fluid_seen: false,
            live_vitals_seen: false,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.history_capacity,
            config.alert_capacity,
            config.alert_policy,
        )
    }

    fn raise_alerts(&mut self) {
        let alerts = self.engine.process(&self.reading);
        if !alerts.is_empty() {
            debug!("{} threshold alert(s) raised", alerts.len());
            self.alerts.prepend(alerts);
        }
    }
}

/// Keeps the entries strictly older than `cutoff`; everything when there is no cutoff.
fn older_than<T>(
    entries: Vec<T>,
    cutoff: Option<OffsetDateTime>,
    timestamp: impl Fn(&T) -> Option<OffsetDateTime>,
) -> Vec<T> {
    match cutoff {
        None => entries,
        Some(cutoff) => entries
            .into_iter()
            .filter(|entry| timestamp(entry).map_or(true, |ts| ts < cutoff))
            .collect(),
    }
}

impl TelemetryApi for MonitorState {
    fn apply_fluid(&mut self, mut sample: FluidSample) {
        sample.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
        self.reading.apply_fluid(&sample);
        if let Some(vitals) = &self.last_vitals {
            self.reading.apply_vitals(vitals);
        }
        trace!("fluid update: {}", self.reading);
        self.fluid_history.push(sample);
        self.live_fluid_seen = true;
        self.raise_alerts();
    }

    fn apply_vitals(&mut self, mut sample: VitalsSample) -> bool {
        if !sample.has_signal() {
            debug!(
                "rejecting vitals without sensor contact (spo2 {})",
                sample.oxygen_saturation
            );
            return false;
        }
        sample.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
        self.reading.apply_vitals(&sample);
        trace!("vitals update: {}", self.reading);
        self.vitals_history.push(sample.clone());
        self.last_vitals = Some(sample);
        self.live_vitals_seen = true;
        self.raise_alerts();
        true
    }

    fn merge_alerts(&mut self, alerts: Vec<Alert>) {
        debug!("merging {} service alert(s)", alerts.len());
        self.alerts.prepend(alerts);
    }

    fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    fn seed_fluid_history(&mut self, history: Vec<FluidSample>) {
        let cutoff = self.fluid_history.first().and_then(|entry| entry.timestamp);
        let older = older_than(history, cutoff, |entry| entry.timestamp);
        if !self.live_fluid_seen {
            if let Some(last) = older.last() {
                self.reading.apply_fluid(last);
            }
        }
        debug!("seeding {} fluid history entries", older.len());
        self.fluid_history.prepend_older(older);
    }

    fn seed_vitals_history(&mut self, history: Vec<VitalsSample>) {
        let cutoff = self.vitals_history.first().and_then(|entry| entry.timestamp);
        let with_signal: Vec<VitalsSample> = history
            .into_iter()
            .filter(VitalsSample::has_signal)
            .collect();
        let older = older_than(with_signal, cutoff, |entry| entry.timestamp);
        if !self.live_vitals_seen {
            if let Some(last) = older.last() {
                self.reading.apply_vitals(last);
                self.last_vitals = Some(last.clone());
            }
        }
        debug!("seeding {} vitals history entries", older.len());
        self.vitals_history.prepend_older(older);
    }

    fn seed_alerts(&mut self, alerts: Vec<Alert>) {
        debug!("seeding {} alert(s)", alerts.len());
        self.alerts.append_older(alerts);
    }

    fn reset(&mut self) {
        self.reading = Reading::default();
        self.last_vitals = None;
        self.fluid_history.clear();
        self.vitals_history.clear();
        self.alerts.clear();
        self.engine.reset();
        self.live_fluid_seen = false;
        self.live_vitals_seen = false;
    }
}

impl MonitorModelApi for MonitorState {
    fn get_reading(&self) -> &Reading {
        &self.reading
    }

    fn get_fluid_history(&self) -> &HistoryBuffer<FluidSample> {
        &self.fluid_history
    }

    fn get_vitals_history(&self) -> &HistoryBuffer<VitalsSample> {
        &self.vitals_history
    }

    fn get_alerts(&self) -> &AlertLog {
        &self.alerts
    }

    fn get_last_vitals(&self) -> Option<&VitalsSample> {
        self.last_vitals.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::alerts::{AlertOrigin, Severity};
    use time::{macros::datetime, Duration};

    const T0: OffsetDateTime = datetime!(2026-03-01 10:00:00 UTC);

    fn fluid(weight: f64, pump: bool, secs: i64) -> FluidSample {
        FluidSample {
            id: None,
            timestamp: Some(T0 + Duration::seconds(secs)),
            weight,
            pump_active: pump,
            fluid_state: "NORMAL".into(),
        }
    }

    fn vitals(hr: u32, spo2: u32, secs: i64) -> VitalsSample {
        VitalsSample {
            id: None,
            timestamp: Some(T0 + Duration::seconds(secs)),
            heart_rate: hr,
            oxygen_saturation: spo2,
            vitals_state: "NORMAL".into(),
        }
    }

    fn remote(id: u64) -> Alert {
        Alert {
            id,
            message: "Bomba activada".into(),
            severity: Severity::Warn,
            code: Some("BOMBA_ON".into()),
            timestamp: None,
            origin: AlertOrigin::Remote,
        }
    }

    fn summary(state: &MonitorState) -> (u32, u32, f64, bool) {
        let r = state.get_reading();
        (r.heart_rate, r.oxygen_saturation, r.fluid_weight, r.pump_active)
    }

    #[test]
    fn test_streams_merge_without_losing_vitals() {
        let mut state = MonitorState::default();
        assert_eq!(summary(&state), (0, 0, 500.0, false));

        state.apply_fluid(fluid(480.0, false, 1));
        assert_eq!(summary(&state), (0, 0, 480.0, false));

        assert!(state.apply_vitals(vitals(78, 97, 2)));
        assert_eq!(summary(&state), (78, 97, 480.0, false));

        state.apply_fluid(fluid(475.0, false, 3));
        assert_eq!(summary(&state), (78, 97, 475.0, false));
        assert_eq!(state.get_reading().timestamp, Some(T0 + Duration::seconds(3)));
    }

    #[test]
    fn test_fast_updates_hold_last_vitals() {
        let mut state = MonitorState::default();
        state.apply_vitals(vitals(72, 98, 0));
        for i in 0..200 {
            state.apply_fluid(fluid(480.0 - i as f64, false, i + 1));
            assert_eq!(state.get_reading().heart_rate, 72);
            assert_eq!(state.get_reading().oxygen_saturation, 98);
        }
        assert_eq!(state.get_vitals_history().len(), 1);
    }

    #[test]
    fn test_fast_updates_without_vitals_keep_placeholder() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(490.0, false, 1));
        state.apply_fluid(fluid(489.0, false, 2));
        assert_eq!(state.get_reading().heart_rate, 0);
        assert_eq!(state.get_reading().vitals_state, "MIDIENDO");
        assert!(state.get_last_vitals().is_none());
    }

    #[test]
    fn test_vitals_without_contact_are_rejected() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(480.0, false, 0));
        state.apply_vitals(vitals(78, 97, 1));
        let before = state.get_reading().clone();

        assert!(!state.apply_vitals(vitals(0, 95, 2)));
        assert_eq!(state.get_reading(), &before);
        assert_eq!(state.get_vitals_history().len(), 1);
        assert_eq!(state.get_last_vitals().unwrap().heart_rate, 78);
    }

    #[test]
    fn test_slow_update_keeps_fluid_fields() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(300.0, true, 0));
        state.apply_vitals(vitals(80, 96, 1));
        let reading = state.get_reading();
        assert_eq!(reading.fluid_weight, 300.0);
        assert!(reading.pump_active);
        assert_eq!(reading.timestamp, Some(T0));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = MonitorState::new(60, 50, AlertPolicy::EveryReading);
        for i in 0..100 {
            state.apply_fluid(fluid(480.0, false, i));
        }
        let history = state.get_fluid_history();
        assert_eq!(history.len(), 60);
        assert_eq!(history.first().unwrap().timestamp, Some(T0 + Duration::seconds(40)));
        assert_eq!(history.last().unwrap().timestamp, Some(T0 + Duration::seconds(99)));
    }

    #[test]
    fn test_missing_timestamp_is_stamped() {
        let mut state = MonitorState::default();
        let mut sample = fluid(480.0, false, 0);
        sample.timestamp = None;
        state.apply_fluid(sample);
        assert!(state.get_fluid_history().last().unwrap().timestamp.is_some());
    }

    #[test]
    fn test_local_alerts_on_accepted_readings() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(40.0, true, 0));
        assert_eq!(state.get_alerts().len(), 2);
        assert!(state.apply_vitals(vitals(105, 97, 1)));
        // the held fluid breach is evaluated again with the new vitals
        assert_eq!(state.get_alerts().len(), 5);
        let newest = state.get_alerts().iter().next().unwrap();
        assert!(newest.message.starts_with("high heart rate"));
        assert_eq!(newest.origin, AlertOrigin::Local);
    }

    #[test]
    fn test_rejected_vitals_raise_nothing() {
        let mut state = MonitorState::default();
        state.apply_vitals(vitals(0, 80, 0));
        assert!(state.get_alerts().is_empty());
    }

    #[test]
    fn test_alert_capacity_across_sources() {
        let mut state = MonitorState::new(60, 20, AlertPolicy::EveryReading);
        for i in 0..15 {
            state.merge_alerts(vec![remote(i)]);
            state.apply_fluid(fluid(480.0, true, i as i64));
        }
        let alerts = state.get_alerts();
        assert_eq!(alerts.len(), 20);
        let first = alerts.iter().next().unwrap();
        assert_eq!(first.origin, AlertOrigin::Local);
        let remote_ids: Vec<u64> = alerts
            .iter()
            .filter(|a| a.origin == AlertOrigin::Remote)
            .map(|a| a.id)
            .collect();
        assert_eq!(remote_ids, (5..15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_clear_alerts() {
        let mut state = MonitorState::default();
        state.merge_alerts(vec![remote(1), remote(2)]);
        state.clear_alerts();
        assert!(state.get_alerts().is_empty());
    }

    #[test]
    fn test_seed_before_live() {
        let mut state = MonitorState::default();
        state.seed_fluid_history(vec![fluid(495.0, false, 0), fluid(494.0, false, 1)]);
        state.seed_vitals_history(vec![vitals(70, 99, 0), vitals(0, 0, 5)]);
        state.seed_alerts(vec![remote(9), remote(8)]);

        assert_eq!(summary(&state), (70, 99, 494.0, false));
        assert_eq!(state.get_fluid_history().len(), 2);
        assert_eq!(state.get_vitals_history().len(), 1);
        assert_eq!(state.get_last_vitals().unwrap().heart_rate, 70);
        assert_eq!(state.get_alerts().len(), 2);

        state.apply_fluid(fluid(493.0, false, 2));
        assert_eq!(summary(&state), (70, 99, 493.0, false));
    }

    #[test]
    fn test_seed_after_live_keeps_live_values() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(470.0, false, 10));
        state.apply_vitals(vitals(82, 96, 10));
        state.merge_alerts(vec![remote(100)]);

        state.seed_fluid_history(vec![
            fluid(480.0, false, 8),
            fluid(479.0, false, 9),
            fluid(470.0, false, 10),
        ]);
        state.seed_vitals_history(vec![vitals(75, 98, 0)]);
        state.seed_alerts(vec![remote(50)]);

        assert_eq!(summary(&state), (82, 96, 470.0, false));
        let weights: Vec<f64> = state.get_fluid_history().iter().map(|s| s.weight).collect();
        assert_eq!(weights, vec![480.0, 479.0, 470.0]);
        assert_eq!(state.get_vitals_history().len(), 2);
        assert_eq!(state.get_last_vitals().unwrap().heart_rate, 82);
        let ids: Vec<u64> = state.get_alerts().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![100, 50]);
    }

    #[test]
    fn test_reset() {
        let mut state = MonitorState::default();
        state.apply_fluid(fluid(40.0, true, 0));
        state.apply_vitals(vitals(78, 97, 1));
        state.reset();
        assert_eq!(state.get_reading(), &Reading::default());
        assert!(state.get_fluid_history().is_empty());
        assert!(state.get_vitals_history().is_empty());
        assert!(state.get_alerts().is_empty());
        assert!(state.get_last_vitals().is_none());
    }

    #[test]
    fn test_independent_instances() {
        let mut a = MonitorState::default();
        let b = MonitorState::default();
        a.apply_vitals(vitals(90, 97, 0));
        assert_eq!(b.get_reading().heart_rate, 0);
        assert!(b.get_last_vitals().is_none());
    }
}
