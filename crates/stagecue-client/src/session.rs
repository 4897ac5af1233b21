//! Session controller -- owns one transport from connect to disconnect.
//!
//! Unconnected -> Connecting -> Ready -> Closed, with Connecting -> Failed on
//! any handshake or transport failure. Commands are only legal in Ready;
//! `disconnect()` is legal everywhere and always ends in Closed.

use std::fmt;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stagecue_protocol::{MessageCodec, ProtocolError, GET_STREAM_STATUS, START_STREAM, STOP_STREAM};

use crate::correlator::Correlator;
use crate::handshake::{handshake, Ready};
use crate::schedule::ScheduledAction;
use crate::transport::{Connector, Transport, WsConnector};
use crate::{ClientError, ConnectionParams, TransportError, DEFAULT_REQUEST_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Ready,
    Closed,
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the stream output, from a `GetStreamStatus` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    #[serde(rename = "outputActive")]
    pub active: bool,
    #[serde(rename = "outputReconnecting", default)]
    pub reconnecting: bool,
    #[serde(rename = "outputTimecode", default)]
    pub timecode: String,
    #[serde(rename = "outputDuration", default)]
    pub duration_ms: u64,
    #[serde(rename = "outputCongestion", default)]
    pub congestion: f64,
    #[serde(rename = "outputBytes", default)]
    pub bytes_sent: u64,
    #[serde(rename = "outputSkippedFrames", default)]
    pub skipped_frames: u64,
    #[serde(rename = "outputTotalFrames", default)]
    pub total_frames: u64,
}

impl StreamStatus {
    pub fn from_response(data: Option<Value>) -> Result<Self, ProtocolError> {
        let data = data.ok_or_else(|| {
            ProtocolError::InvalidPayload("GetStreamStatus reply has no responseData".into())
        })?;
        serde_json::from_value(data)
            .map_err(|e| ProtocolError::InvalidPayload(format!("GetStreamStatus: {e}")))
    }
}

pub struct Session<C: Connector = WsConnector> {
    params: ConnectionParams,
    connector: C,
    codec: MessageCodec,
    request_timeout: Duration,
    transport: Option<C::Transport>,
    ready: Option<Ready>,
    state: SessionState,
    failure: Option<ClientError>,
}

impl Session<WsConnector> {
    pub fn new(params: ConnectionParams) -> Self {
        Self::with_connector(params, WsConnector)
    }
}

impl<C: Connector> Session<C> {
    pub fn with_connector(params: ConnectionParams, connector: C) -> Self {
        Self {
            params,
            connector,
            codec: MessageCodec::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transport: None,
            ready: None,
            state: SessionState::Unconnected,
            failure: None,
        }
    }

    /// Bound on connecting and on every receive.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The handshake failure behind the last `connect()` that returned false.
    pub fn failure(&self) -> Option<&ClientError> {
        self.failure.as_ref()
    }

    pub fn take_failure(&mut self) -> Option<ClientError> {
        self.failure.take()
    }

    pub fn negotiated_rpc_version(&self) -> Option<u32> {
        self.ready.as_ref().map(Ready::negotiated_rpc_version)
    }

    /// Open the transport and handshake. `Ok(false)` means the server was
    /// reached but the handshake failed (see `failure()`); transport problems
    /// are returned as errors so "server absent" stays distinguishable from
    /// "bad credentials".
    pub async fn connect(&mut self) -> Result<bool, ClientError> {
        match self.establish().await {
            Ok(()) => Ok(true),
            Err(e @ (ClientError::Transport(_) | ClientError::InvalidState { .. })) => Err(e),
            Err(e) => {
                self.failure = Some(e);
                Ok(false)
            }
        }
    }

    /// Like `connect()` but every failure is an error.
    pub async fn establish(&mut self) -> Result<(), ClientError> {
        if self.state != SessionState::Unconnected {
            return Err(ClientError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        self.state = SessionState::Connecting;

        let opened = tokio::time::timeout(self.request_timeout, self.connector.open(&self.params))
            .await
            .unwrap_or(Err(TransportError::Timeout(self.request_timeout)));
        let mut transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(url = %self.params.url(), error = %e, "connection failed");
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };

        let secret = self.params.secret.as_deref();
        match handshake(&mut transport, secret, &self.codec, self.request_timeout).await {
            Ok(ready) => {
                tracing::info!(
                    host = %self.params.host,
                    port = self.params.port,
                    rpc_version = ready.negotiated_rpc_version(),
                    "session ready"
                );
                self.transport = Some(transport);
                self.ready = Some(ready);
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(host = %self.params.host, error = %e, "handshake failed");
                if let Err(close_err) = transport.close().await {
                    tracing::debug!(error = %close_err, "close after failed handshake");
                }
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    pub async fn start_streaming(&mut self) -> Result<(), ClientError> {
        self.issue("start_streaming", START_STREAM, None).await?;
        tracing::info!("streaming started");
        Ok(())
    }

    pub async fn stop_streaming(&mut self) -> Result<(), ClientError> {
        self.issue("stop_streaming", STOP_STREAM, None).await?;
        tracing::info!("streaming stopped");
        Ok(())
    }

    pub async fn stream_status(&mut self) -> Result<StreamStatus, ClientError> {
        let data = self.issue("stream_status", GET_STREAM_STATUS, None).await?;
        Ok(StreamStatus::from_response(data)?)
    }

    /// Wait until the next local `at` (HH:MM), start streaming, and if a
    /// non-zero duration is given, stop again that many minutes later.
    pub async fn schedule_stream(
        &mut self,
        at: &str,
        duration_minutes: Option<u64>,
    ) -> Result<ScheduledAction<Local>, ClientError> {
        let action = ScheduledAction::plan(at, duration_minutes, &Local::now())?;
        self.schedule_at(&action).await?;
        Ok(action)
    }

    /// Run an already planned action.
    pub async fn schedule_at<Tz: TimeZone>(
        &mut self,
        action: &ScheduledAction<Tz>,
    ) -> Result<(), ClientError> {
        self.require_ready("schedule_stream")?;

        let wait = action.wait_from(&Utc::now());
        tracing::info!(
            scheduled_for = %action.target.naive_local(),
            wait_secs = wait.as_secs(),
            stop_after_mins = action.stop_after.map(|d| d.as_secs() / 60),
            "stream scheduled"
        );
        tokio::time::sleep(wait).await;

        tracing::info!("starting scheduled stream");
        self.start_streaming().await?;

        if let Some(stop_after) = action.stop_after {
            tracing::info!(minutes = stop_after.as_secs() / 60, "stream will stop automatically");
            tokio::time::sleep(stop_after).await;
            tracing::info!("stopping scheduled stream");
            self.stop_streaming().await?;
        }
        Ok(())
    }

    /// Close the transport if open. Safe in every state, any number of times.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match transport.close().await {
                Ok(()) => tracing::info!(host = %self.params.host, "disconnected"),
                Err(e) => tracing::warn!(error = %e, "error while closing connection"),
            }
        }
        self.ready = None;
        self.state = SessionState::Closed;
    }

    fn require_ready(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.state != SessionState::Ready {
            return Err(ClientError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    async fn issue(
        &mut self,
        operation: &'static str,
        (request_type, request_id): (&str, &str),
        request_data: Option<Value>,
    ) -> Result<Option<Value>, ClientError> {
        self.require_ready(operation)?;
        let (Some(transport), Some(ready)) = (self.transport.as_mut(), self.ready.as_ref()) else {
            return Err(ClientError::InvalidState {
                operation,
                state: self.state,
            });
        };

        let result = Correlator::new(self.codec, self.request_timeout)
            .call(transport, ready, request_type, request_id, request_data)
            .await;

        // A broken stream or a reply out of sequence leaves nothing to trust.
        if let Err(ClientError::Transport(_) | ClientError::Protocol(_)) = &result {
            self.state = SessionState::Failed;
        }
        result
    }
}
