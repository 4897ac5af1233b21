//! Wire message types, one variant per op code.
//!
//! The server speaks `{ "op": n, "d": payload }`. `Envelope` is that raw
//! shape; `Message` is the typed view the rest of the client matches on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ============================================================================
// Op codes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Hello = 0,
    Identify = 1,
    Identified = 2,
    Reidentify = 3,
    Event = 5,
    Request = 6,
    RequestResponse = 7,
    RequestBatch = 8,
    RequestBatchResponse = 9,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            0 => Some(OpCode::Hello),
            1 => Some(OpCode::Identify),
            2 => Some(OpCode::Identified),
            3 => Some(OpCode::Reidentify),
            5 => Some(OpCode::Event),
            6 => Some(OpCode::Request),
            7 => Some(OpCode::RequestResponse),
            8 => Some(OpCode::RequestBatch),
            9 => Some(OpCode::RequestBatchResponse),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Hello => "Hello",
            OpCode::Identify => "Identify",
            OpCode::Identified => "Identified",
            OpCode::Reidentify => "Reidentify",
            OpCode::Event => "Event",
            OpCode::Request => "Request",
            OpCode::RequestResponse => "RequestResponse",
            OpCode::RequestBatch => "RequestBatch",
            OpCode::RequestBatchResponse => "RequestBatchResponse",
        }
    }
}

/// Raw `{op, d}` frame before the payload is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
}

// ============================================================================
// Handshake
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_web_socket_version: Option<String>,
    pub rpc_version: u32,
    /// Present only when the server requires a password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_subscriptions: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiated_rpc_version: Option<u32>,
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    #[serde(default)]
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ============================================================================
// Message
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(Hello),
    Identify(Identify),
    Identified(Identified),
    Event(Event),
    Request(Request),
    RequestResponse(RequestResponse),
}

impl Message {
    pub fn op(&self) -> OpCode {
        match self {
            Message::Hello(_) => OpCode::Hello,
            Message::Identify(_) => OpCode::Identify,
            Message::Identified(_) => OpCode::Identified,
            Message::Event(_) => OpCode::Event,
            Message::Request(_) => OpCode::Request,
            Message::RequestResponse(_) => OpCode::RequestResponse,
        }
    }

    pub fn name(&self) -> &'static str {
        self.op().name()
    }

    pub fn to_envelope(&self) -> Result<Envelope, ProtocolError> {
        let d = match self {
            Message::Hello(m) => serde_json::to_value(m)?,
            Message::Identify(m) => serde_json::to_value(m)?,
            Message::Identified(m) => serde_json::to_value(m)?,
            Message::Event(m) => serde_json::to_value(m)?,
            Message::Request(m) => serde_json::to_value(m)?,
            Message::RequestResponse(m) => serde_json::to_value(m)?,
        };
        Ok(Envelope {
            op: self.op() as u8,
            d,
        })
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let op = OpCode::from_u8(envelope.op).ok_or(ProtocolError::UnknownOp(envelope.op))?;
        let d = envelope.d;
        let message = match op {
            OpCode::Hello => Message::Hello(serde_json::from_value(d)?),
            OpCode::Identify => Message::Identify(serde_json::from_value(d)?),
            OpCode::Identified => Message::Identified(serde_json::from_value(d)?),
            OpCode::Event => Message::Event(serde_json::from_value(d)?),
            OpCode::Request => Message::Request(serde_json::from_value(d)?),
            OpCode::RequestResponse => Message::RequestResponse(serde_json::from_value(d)?),
            OpCode::Reidentify | OpCode::RequestBatch | OpCode::RequestBatchResponse => {
                return Err(ProtocolError::UnsupportedOp(envelope.op))
            }
        };
        Ok(message)
    }
}
