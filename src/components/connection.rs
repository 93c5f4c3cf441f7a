//! Connection Component
//!
//! State machine of the live channel: `Idle -> Connected <-> Disconnected`.
//!
//! Each call to `connect` opens a new channel instance under a fresh generation
//! number and aborts the previous one. The listener task of an instance forwards
//! its lifecycle and frames to the event bus tagged with that generation, so
//! events still queued from a superseded instance are recognized and ignored.
//! After a close, exactly one reconnection is scheduled on a timer task.
use crate::{
    api::{
        controller::{ChannelFactory, ConnectionApi},
        model::{ConnectionModelApi, ConnectionState},
    },
    core::{
        config::ReconnectPolicy,
        constants::{CHANNEL_IDLE_TIMEOUT, CHANNEL_OPEN_TIMEOUT},
        events::{AppEvent, ChannelEvent},
    },
};
use anyhow::Result;
use futures::StreamExt;
use log::{error, info, trace, warn};
use std::{fmt, sync::Arc};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time::timeout};

/// Manages the live channel.
///
/// # Fields
/// - `factory`: Opens channel instances
/// - `url`: Live channel address
/// - `policy`: Delay schedule between a close and the next attempt
/// - `event_bus`: Channel for delivering channel events to the controller
/// - `generation`: Generation of the instance whose events are accepted
/// - `failures`: Closes since the last successful open
/// - `listener_handle`: Task driving the current instance
/// - `reconnect_handle`: Pending reconnection timer
pub struct ConnectionComponent<F: ChannelFactory + 'static> {
    factory: Arc<F>,
    url: String,
    policy: ReconnectPolicy,
    event_bus: UnboundedSender<AppEvent>,
    state: ConnectionState,
    generation: u64,
    failures: u32,
    listener_handle: Option<JoinHandle<()>>,
    reconnect_handle: Option<JoinHandle<()>>,
}

impl<F: ChannelFactory + 'static> fmt::Debug for ConnectionComponent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionComponent")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl<F: ChannelFactory + 'static> Drop for ConnectionComponent<F> {
    fn drop(&mut self) {
        if let Some(handle) = &self.listener_handle {
            handle.abort();
        }
        if let Some(handle) = &self.reconnect_handle {
            handle.abort();
        }
    }
}

impl<F: ChannelFactory + 'static> ConnectionComponent<F> {
    pub fn new(
        factory: Arc<F>,
        url: String,
        policy: ReconnectPolicy,
        event_bus: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            factory,
            url,
            policy,
            event_bus,
            state: ConnectionState::Idle,
            generation: 0,
            failures: 0,
            listener_handle: None,
            reconnect_handle: None,
        }
    }

    /// Drives one channel instance until it closes, fails or is aborted.
    ///
    /// A handshake that does not complete within `CHANNEL_OPEN_TIMEOUT`, and an
    /// open channel silent for `CHANNEL_IDLE_TIMEOUT`, both end as `Failed`.
    async fn listen(factory: Arc<F>, url: String, generation: u64, tx: UnboundedSender<AppEvent>) {
        let send = |event: ChannelEvent| tx.send(AppEvent::Channel(event)).is_ok();
        let fail = |reason: String| {
            send(ChannelEvent::Failed { generation, reason });
        };

        let mut frames = match timeout(CHANNEL_OPEN_TIMEOUT, factory.open(&url)).await {
            Ok(Ok(frames)) => frames,
            Ok(Err(e)) => return fail(e.to_string()),
            Err(_) => {
                return fail(format!(
                    "handshake not completed within {:?}",
                    CHANNEL_OPEN_TIMEOUT
                ))
            }
        };
        if !send(ChannelEvent::Opened { generation }) {
            return;
        }
        loop {
            match timeout(CHANNEL_IDLE_TIMEOUT, frames.next()).await {
                Ok(Some(Ok(payload))) => {
                    if !send(ChannelEvent::Frame {
                        generation,
                        payload,
                    }) {
                        return;
                    }
                }
                Ok(Some(Err(e))) => return fail(e.to_string()),
                Ok(None) => break,
                Err(_) => {
                    return fail(format!("no frame received for {:?}", CHANNEL_IDLE_TIMEOUT))
                }
            }
        }
        send(ChannelEvent::Closed { generation });
    }

    fn abort_tasks(&mut self) {
        if let Some(handle) = self.listener_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.reconnect_handle.take() {
            handle.abort();
        }
    }

    /// Close path shared by `Closed` and `Failed`.
    fn handle_close(&mut self) {
        self.state = ConnectionState::Disconnected;
        if let Some(handle) = self.listener_handle.take() {
            handle.abort();
        }
        if self.reconnect_handle.is_some() {
            return;
        }
        self.failures = self.failures.saturating_add(1);
        let delay = self.policy.delay_for(self.failures);
        info!("reconnecting in {:?}", delay);

        let tx = self.event_bus.clone();
        let generation = self.generation;
        self.reconnect_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(AppEvent::Channel(ChannelEvent::ReconnectDue { generation }));
        }));
    }
}

impl<F: ChannelFactory + 'static> ConnectionModelApi for ConnectionComponent<F> {
    fn get_state(&self) -> ConnectionState {
        self.state
    }

    fn get_generation(&self) -> u64 {
        self.generation
    }
}

impl<F: ChannelFactory + 'static> ConnectionApi for ConnectionComponent<F> {
    fn connect(&mut self) -> Result<()> {
        self.abort_tasks();
        self.generation += 1;
        info!("opening live channel #{} to {}", self.generation, self.url);
        self.listener_handle = Some(tokio::spawn(Self::listen(
            self.factory.clone(),
            self.url.clone(),
            self.generation,
            self.event_bus.clone(),
        )));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.abort_tasks();
        // invalidates everything still queued on the bus
        self.generation += 1;
        self.state = ConnectionState::Idle;
        info!("live channel torn down");
    }

    fn on_channel_event(&mut self, event: ChannelEvent) -> Option<String> {
        match event {
            ChannelEvent::Opened { generation } if generation == self.generation => {
                info!("live channel #{} connected", generation);
                self.state = ConnectionState::Connected;
                self.failures = 0;
                None
            }
            ChannelEvent::Frame {
                generation,
                payload,
            } if generation == self.generation => Some(payload),
            ChannelEvent::Closed { generation } if generation == self.generation => {
                warn!("live channel #{} closed", generation);
                self.handle_close();
                None
            }
            ChannelEvent::Failed { generation, reason } if generation == self.generation => {
                warn!("live channel #{} failed: {}", generation, reason);
                self.handle_close();
                None
            }
            ChannelEvent::ReconnectDue { generation } if generation == self.generation => {
                if let Err(e) = self.connect() {
                    error!("reconnection failed: {}", e);
                }
                None
            }
            stale => {
                trace!("ignoring event of superseded channel: {:?}", stale);
                None
            }
        }
    }
}
