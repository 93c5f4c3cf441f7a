//! Bootstrap Loader
//!
//! Fetches recent history and alerts when the client starts. The three requests
//! run concurrently and each result is posted to the event bus on its own, so a
//! slow or failed request never holds back the others.
use crate::{
    api::controller::BackendApi,
    core::events::{AppEvent, BootstrapEvent},
};
use anyhow::Result;
use log::{trace, warn};
use std::{future::Future, sync::Arc};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

/// Spawns the bootstrap requests.
///
/// # Arguments
/// - `backend`: Service to fetch from.
/// - `history_limit`: Entries requested per stream.
/// - `alert_limit`: Alerts requested.
/// - `event_bus`: Receives one `AppEvent::Bootstrap` per successful request.
///
/// # Returns
/// The handles of the request tasks.
pub fn spawn_bootstrap<B: BackendApi + 'static>(
    backend: Arc<B>,
    history_limit: usize,
    alert_limit: usize,
    event_bus: UnboundedSender<AppEvent>,
) -> Vec<JoinHandle<()>> {
    let fluid = {
        let backend = backend.clone();
        async move {
            backend
                .fetch_fluid_history(history_limit)
                .await
                .map(BootstrapEvent::FluidHistory)
        }
    };
    let vitals = {
        let backend = backend.clone();
        async move {
            backend
                .fetch_vitals_history(history_limit)
                .await
                .map(BootstrapEvent::VitalsHistory)
        }
    };
    let alerts = async move {
        backend
            .fetch_alerts(alert_limit)
            .await
            .map(BootstrapEvent::Alerts)
    };
    vec![
        spawn_fetch("fluid history", fluid, event_bus.clone()),
        spawn_fetch("vitals history", vitals, event_bus.clone()),
        spawn_fetch("alerts", alerts, event_bus),
    ]
}

fn spawn_fetch<F>(what: &'static str, fetch: F, event_bus: UnboundedSender<AppEvent>) -> JoinHandle<()>
where
    F: Future<Output = Result<BootstrapEvent>> + Send + 'static,
{
    tokio::spawn(async move {
        match fetch.await {
            Ok(event) => {
                if event_bus.send(AppEvent::Bootstrap(event)).is_err() {
                    trace!("client gone, dropping bootstrapped {}", what);
                }
            }
            Err(e) => warn!("could not bootstrap {}: {}", what, e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::controller::MockBackendApi,
        model::{
            alerts::{Alert, AlertOrigin, Severity},
            telemetry::{FluidSample, VitalsSample},
        },
    };
    use anyhow::anyhow;
    use tokio::sync::mpsc;

    fn vitals(hr: u32) -> VitalsSample {
        VitalsSample {
            id: None,
            timestamp: None,
            heart_rate: hr,
            oxygen_saturation: 97,
            vitals_state: "NORMAL".into(),
        }
    }

    fn alert(id: u64) -> Alert {
        Alert {
            id,
            message: "Nivel critico de suero".into(),
            severity: Severity::Critical,
            code: Some("SUERO_CRITICO".into()),
            timestamp: None,
            origin: AlertOrigin::Remote,
        }
    }

    async fn drain(handles: Vec<JoinHandle<()>>, rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<BootstrapEvent> {
        for handle in handles {
            handle.await.unwrap();
        }
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Bootstrap(event) => events.push(event),
                other => panic!("unexpected event {:?}", other),
            }
        }
        events
    }

    #[tokio::test]
    async fn test_requests_use_limits() {
        let mut backend = MockBackendApi::new();
        backend
            .expect_fetch_fluid_history()
            .withf(|limit| *limit == 60)
            .times(1)
            .returning(|_| {
                Ok(vec![FluidSample {
                    id: Some(1),
                    timestamp: None,
                    weight: 480.0,
                    pump_active: false,
                    fluid_state: "NORMAL".into(),
                }])
            });
        backend
            .expect_fetch_vitals_history()
            .withf(|limit| *limit == 60)
            .times(1)
            .returning(|_| Ok(vec![vitals(78)]));
        backend
            .expect_fetch_alerts()
            .withf(|limit| *limit == 20)
            .times(1)
            .returning(|_| Ok(vec![alert(2), alert(1)]));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles = spawn_bootstrap(Arc::new(backend), 60, 20, tx);
        let events = drain(handles, &mut rx).await;

        assert_eq!(events.len(), 3);
        assert!(events.contains(&BootstrapEvent::VitalsHistory(vec![vitals(78)])));
        assert!(events.contains(&BootstrapEvent::Alerts(vec![alert(2), alert(1)])));
    }

    #[tokio::test]
    async fn test_partial_failure_delivers_the_rest() {
        let mut backend = MockBackendApi::new();
        backend
            .expect_fetch_fluid_history()
            .returning(|_| Err(anyhow!("503 Service Unavailable")));
        backend
            .expect_fetch_vitals_history()
            .returning(|_| Ok(vec![vitals(70)]));
        backend
            .expect_fetch_alerts()
            .returning(|_| Err(anyhow!("timeout")));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles = spawn_bootstrap(Arc::new(backend), 60, 20, tx);
        let events = drain(handles, &mut rx).await;

        assert_eq!(events, vec![BootstrapEvent::VitalsHistory(vec![vitals(70)])]);
    }

    #[tokio::test]
    async fn test_results_after_teardown_are_dropped() {
        let mut backend = MockBackendApi::new();
        backend.expect_fetch_fluid_history().returning(|_| Ok(vec![]));
        backend.expect_fetch_vitals_history().returning(|_| Ok(vec![]));
        backend.expect_fetch_alerts().returning(|_| Ok(vec![]));

        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        for handle in spawn_bootstrap(Arc::new(backend), 60, 20, tx) {
            assert!(handle.await.is_ok());
        }
    }
}
