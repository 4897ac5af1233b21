//! Message transport -- one duplex text-message connection per session.
//!
//! `Transport` is the seam the handshake and correlator talk through;
//! `Connector` opens one. Production uses a WebSocket over TCP.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{ConnectionParams, TransportError};

/// A single duplex, message-oriented connection.
pub trait Transport: Send {
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next text message. Control frames are handled internally.
    fn receive(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens transports. Cloned into every session a `Trigger` creates.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    fn open(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// Receive one message, failing with `Timeout` instead of blocking forever.
pub async fn receive_within<T: Transport>(
    transport: &mut T,
    timeout: Duration,
) -> Result<String, TransportError> {
    tokio::time::timeout(timeout, transport.receive())
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

// ============================================================================
// WebSocket
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn open(&self, params: &ConnectionParams) -> Result<WsTransport, TransportError> {
        let url = params.url();
        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    addr: url.clone(),
                    reason: e.to_string(),
                })?;

        tracing::info!(url = %url, "websocket connected");
        Ok(WsTransport { stream })
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(WsMessage::Text(text))
            .await
            .map_err(map_ws_error)
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        loop {
            let frame = match self.stream.next().await {
                Some(frame) => frame.map_err(map_ws_error)?,
                None => {
                    return Err(TransportError::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    })
                }
            };

            match frame {
                WsMessage::Text(text) => return Ok(text),
                WsMessage::Binary(_) => return Err(TransportError::UnexpectedFrame("binary")),
                WsMessage::Close(close) => {
                    let (code, reason) = match close {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Err(TransportError::Closed { code, reason });
                }
                // Pings are answered by tungstenite on the next read/write.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }
}

fn map_ws_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed {
                code: None,
                reason: e.to_string(),
            }
        }
        other => TransportError::Io(other.to_string()),
    }
}

// ============================================================================
// Scripted transport for unit tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::scripted::*;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_receive_within_times_out_on_silent_peer() {
        let (mut transport, _log) = ScriptedTransport::new(vec![]);
        let err = receive_within(&mut transport, Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(d) if d == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_receive_within_passes_message_through() {
        let (mut transport, _log) = ScriptedTransport::new(vec![Incoming::Text("hi".into())]);
        let text = receive_within(&mut transport, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = WsConnector
            .open(&ConnectionParams::new("127.0.0.1", port))
            .await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
