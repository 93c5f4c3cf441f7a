//! Live Channel Frames
//!
//! Decoding of inbound live-channel frames. Every frame is a JSON object with a
//! `type` discriminant and a `data` payload:
//! - `lectura`: fast stream, one `FluidSample`
//! - `vitales`: slow stream, one `VitalsSample`
//! - `alertas`: a batch of service alerts
//! - `ping`: keep-alive, no payload
//!
//! Decoding never panics; a frame that cannot be used yields a `FrameError` and
//! the caller drops it.

use super::{
    alerts::Alert,
    telemetry::{FluidSample, VitalsSample},
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// A decoded, structurally valid frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Fluid(FluidSample),
    Vitals(VitalsSample),
    Alerts(Vec<Alert>),
    KeepAlive,
}

/// Why a frame was dropped.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown frame type `{0}`")]
    UnknownType(String),

    #[error("`{0}` frame without payload")]
    MissingPayload(&'static str),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

const FLUID: &str = "lectura";
const VITALS: &str = "vitales";
const ALERTS: &str = "alertas";
const KEEP_ALIVE: &str = "ping";

impl Frame {
    /// Decodes one raw text frame.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        match envelope.kind.as_str() {
            FLUID => Ok(Frame::Fluid(payload(FLUID, envelope.data)?)),
            VITALS => Ok(Frame::Vitals(payload(VITALS, envelope.data)?)),
            ALERTS => Ok(Frame::Alerts(payload(ALERTS, envelope.data)?)),
            KEEP_ALIVE => Ok(Frame::KeepAlive),
            _ => Err(FrameError::UnknownType(envelope.kind)),
        }
    }

    /// Serializes the frame in the service's envelope format.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Frame::Fluid(sample) => serde_json::to_value(sample)?,
            Frame::Vitals(sample) => serde_json::to_value(sample)?,
            Frame::Alerts(alerts) => serde_json::to_value(alerts)?,
            Frame::KeepAlive => return serde_json::to_string(&json!({ "type": KEEP_ALIVE })),
        };
        serde_json::to_string(&json!({ "type": self.kind(), "data": data }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Fluid(_) => FLUID,
            Frame::Vitals(_) => VITALS,
            Frame::Alerts(_) => ALERTS,
            Frame::KeepAlive => KEEP_ALIVE,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: Option<Value>,
) -> Result<T, FrameError> {
    match data {
        None | Some(Value::Null) => Err(FrameError::MissingPayload(kind)),
        Some(value) => {
            serde_json::from_value(value).map_err(|source| FrameError::InvalidPayload { kind, source })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fluid_frame() {
        let frame = Frame::decode(
            r#"{"type":"lectura","data":{"peso":480,"bomba":false,"estado_suero":"NORMAL",
            "timestamp":"2026-03-01T10:00:01"},"alertas":[]}"#,
        )
        .unwrap();
        match frame {
            Frame::Fluid(sample) => {
                assert_eq!(sample.weight, 480.0);
                assert!(!sample.pump_active);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_vitals_frame() {
        let frame =
            Frame::decode(r#"{"type":"vitales","data":{"fc":78,"spo2":97,"estado_vitales":"NORMAL"}}"#)
                .unwrap();
        assert_eq!(frame.kind(), "vitales");
        if let Frame::Vitals(sample) = frame {
            assert_eq!(sample.heart_rate, 78);
            assert_eq!(sample.oxygen_saturation, 97);
        } else {
            panic!("expected vitals frame");
        }
    }

    #[test]
    fn test_decode_averaged_vitals() {
        for (data, hr, spo2) in [
            (r#"{"fc":78.0,"spo2":97}"#, 78, 97),
            (r#"{"fc":77.6,"spo2":96.5}"#, 78, 97),
            (r#"{"fc":null,"spo2":null}"#, 0, 0),
        ] {
            let frame = Frame::decode(&format!(r#"{{"type":"vitales","data":{}}}"#, data)).unwrap();
            match frame {
                Frame::Vitals(sample) => {
                    assert_eq!(sample.heart_rate, hr, "{}", data);
                    assert_eq!(sample.oxygen_saturation, spo2, "{}", data);
                }
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_alert_batch() {
        let frame = Frame::decode(
            r#"{"type":"alertas","data":[{"id":1,"tipo":"BOMBA_ON","mensaje":"Bomba activada"},
            {"id":2,"tipo":"SUERO_CRITICO","mensaje":"Nivel critico"}]}"#,
        )
        .unwrap();
        if let Frame::Alerts(alerts) = frame {
            assert_eq!(alerts.len(), 2);
            assert_eq!(alerts[0].id, 1);
        } else {
            panic!("expected alert batch");
        }
    }

    #[test]
    fn test_keep_alive() {
        assert_eq!(Frame::decode(r#"{"type":"ping"}"#).unwrap(), Frame::KeepAlive);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Frame::decode("{not json"),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(
            Frame::decode(r#"{"data":{}}"#),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        match Frame::decode(r#"{"type":"telemetria","data":{}}"#) {
            Err(FrameError::UnknownType(kind)) => assert_eq!(kind, "telemetria"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_payload() {
        assert!(matches!(
            Frame::decode(r#"{"type":"lectura"}"#),
            Err(FrameError::MissingPayload("lectura"))
        ));
        assert!(matches!(
            Frame::decode(r#"{"type":"vitales","data":null}"#),
            Err(FrameError::MissingPayload("vitales"))
        ));
    }

    #[test]
    fn test_invalid_payload() {
        assert!(matches!(
            Frame::decode(r#"{"type":"lectura","data":{"bomba":true}}"#),
            Err(FrameError::InvalidPayload { kind: "lectura", .. })
        ));
        assert!(matches!(
            Frame::decode(r#"{"type":"alertas","data":{"id":1}}"#),
            Err(FrameError::InvalidPayload { kind: "alertas", .. })
        ));
    }

    #[test]
    fn test_encode_uses_service_envelope() {
        assert_eq!(Frame::KeepAlive.encode().unwrap(), r#"{"type":"ping"}"#);
        let raw = Frame::Vitals(VitalsSample {
            id: None,
            timestamp: None,
            heart_rate: 72,
            oxygen_saturation: 98,
            vitals_state: "NORMAL".into(),
        })
        .encode()
        .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "vitales");
        assert_eq!(value["data"]["fc"], 72);
    }
}
