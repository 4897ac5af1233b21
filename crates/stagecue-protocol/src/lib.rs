//! Stagecue Protocol -- wire envelopes, text codec, authentication token.
//!
//! WebSocket text frames between client and server. Every frame is a JSON
//! envelope `{ "op": <u8>, "d": { ... } }`; the op code selects the payload.

pub mod auth;
pub mod codec;
pub mod messages;

pub use auth::authentication_token;
pub use codec::MessageCodec;
pub use messages::*;

/// RPC version spoken by this client.
pub const RPC_VERSION: u32 = 1;

/// Default control server port.
pub const DEFAULT_PORT: u16 = 4455;

/// Event subscription bitmask requesting no events at all.
pub const EVENT_SUBSCRIPTION_NONE: u32 = 0;

/// Close code the server uses when the Identify token is wrong.
pub const CLOSE_CODE_AUTHENTICATION_FAILED: u16 = 4009;

/// Maximum accepted text frame size in bytes.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Fixed request type / request id pairs used by the client.
pub const START_STREAM: (&str, &str) = ("StartStream", "start-stream");
pub const STOP_STREAM: (&str, &str) = ("StopStream", "stop-stream");
pub const GET_STREAM_STATUS: (&str, &str) = ("GetStreamStatus", "get-stream-status");

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("unknown op code {0}")]
    UnknownOp(u8),
    #[error("op code {0} is not supported by this client")]
    UnsupportedOp(u8),
    #[error("expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    #[error("reply request id {received:?} does not match sent id {sent:?}")]
    RequestIdMismatch { sent: String, received: String },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
