use super::{alerts::Alert, telemetry::Reading};
use serde::Serialize;

/// Request body of `POST /enviar-email`: the current reading and alert list, sent
/// to the patient's contact.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmailReport {
    #[serde(rename = "destinatario")]
    pub recipient: String,
    pub payload: Reading,
    #[serde(rename = "alertas")]
    pub alerts: Vec<Alert>,
}
