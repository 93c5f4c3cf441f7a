//! Backend Component
//!
//! Network adapters for the monitoring service: `reqwest` for the
//! request/response endpoints and `tokio-tungstenite` for the live channel.
use crate::{
    api::controller::{BackendApi, ChannelFactory, FrameStream},
    core::constants::{
        ALERTS_PATH, COMMANDS_PATH, EMAIL_PATH, FLUID_HISTORY_PATH, REQUEST_TIMEOUT,
        VITALS_HISTORY_PATH,
    },
    model::{
        alerts::Alert,
        command::{CommandAck, CommandRequest, PumpCommand},
        report::EmailReport,
        telemetry::{FluidSample, VitalsSample},
    },
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// `BackendApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str, limit: usize) -> Result<Vec<T>> {
        let url = self.endpoint(path);
        trace!("GET {}?limit={}", url, limit);
        let list = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<T>>()
            .await?;
        debug!("GET {} returned {} entries", url, list.len());
        Ok(list)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn fetch_fluid_history(&self, limit: usize) -> Result<Vec<FluidSample>> {
        self.fetch_list(FLUID_HISTORY_PATH, limit).await
    }

    async fn fetch_vitals_history(&self, limit: usize) -> Result<Vec<VitalsSample>> {
        self.fetch_list(VITALS_HISTORY_PATH, limit).await
    }

    async fn fetch_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        self.fetch_list(ALERTS_PATH, limit).await
    }

    async fn clear_alerts(&self) -> Result<()> {
        self.client
            .delete(self.endpoint(ALERTS_PATH))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_command(&self, command: PumpCommand) -> Result<CommandAck> {
        let ack = self
            .client
            .post(self.endpoint(COMMANDS_PATH))
            .json(&CommandRequest { cmd: command })
            .send()
            .await?
            .error_for_status()?
            .json::<CommandAck>()
            .await?;
        if !ack.ok {
            return Err(anyhow!("command {} rejected by the service", command));
        }
        Ok(ack)
    }

    async fn send_report(&self, report: &EmailReport) -> Result<()> {
        self.client
            .post(self.endpoint(EMAIL_PATH))
            .json(report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// `ChannelFactory` opening WebSocket connections.
///
/// Text frames are passed through; binary frames are passed through when they
/// hold UTF-8. Control frames are handled by the socket itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketFactory;

#[async_trait]
impl ChannelFactory for WebSocketFactory {
    async fn open(&self, url: &str) -> Result<FrameStream> {
        let (socket, response) = connect_async(url).await?;
        debug!("websocket handshake with {}: {}", url, response.status());
        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(e) => {
                        debug!("dropping non UTF-8 binary frame: {}", e);
                        None
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!("close frame received: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        });
        Ok(Box::pin(frames))
    }
}
