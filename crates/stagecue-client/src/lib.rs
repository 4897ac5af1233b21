//! Stagecue Client -- remote control client for a streaming application.
//!
//! Opens a WebSocket session, runs the Hello/Identify handshake, then issues
//! one request at a time (start, stop, status), optionally deferred to a
//! wall-clock time. The `stagecue` binary and the weekly scheduler are thin
//! layers over `Trigger`.

pub mod config;
pub mod correlator;
pub mod handshake;
pub mod recurring;
pub mod schedule;
pub mod session;
pub mod transport;
pub mod trigger;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use stagecue_protocol::ProtocolError;

pub use session::{Session, SessionState, StreamStatus};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
pub use trigger::{Action, ActionOutcome, Trigger};

/// Default bound on every handshake and reply receive.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to reach the control server and how to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub secret: Option<String>,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },
    #[error("connection closed (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },
    #[error("no message within {0:?}")]
    Timeout(Duration),
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("server requires authentication but no password is configured")]
    AuthRequired,
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    #[error("{request_type} failed (code {code:?}): {}", .comment.as_deref().unwrap_or("no comment"))]
    RequestFailed {
        request_type: String,
        code: Option<u32>,
        comment: Option<String>,
    },
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("{operation} is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("operation cancelled by shutdown")]
    Cancelled,
}

impl ClientError {
    /// True when the server could not be reached or the socket failed, as
    /// opposed to the server answering with something we reject.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
