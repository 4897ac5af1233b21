//! Request/response correlation.
//!
//! One request in flight at a time: send, then read exactly one reply and
//! check that its request id is the one we sent. Replies are never buffered
//! or reordered, and failed requests are never retried here.

use std::time::Duration;

use serde_json::Value;
use stagecue_protocol::{Message, MessageCodec, ProtocolError, Request};

use crate::handshake::Ready;
use crate::transport::{receive_within, Transport};
use crate::ClientError;

#[derive(Debug, Clone, Copy)]
pub struct Correlator {
    codec: MessageCodec,
    timeout: Duration,
}

impl Correlator {
    pub fn new(codec: MessageCodec, timeout: Duration) -> Self {
        Self { codec, timeout }
    }

    /// Send one request and return the reply's `responseData` (if any).
    pub async fn call<T: Transport>(
        &self,
        transport: &mut T,
        _ready: &Ready,
        request_type: &str,
        request_id: &str,
        request_data: Option<Value>,
    ) -> Result<Option<Value>, ClientError> {
        let request = Message::Request(Request {
            request_type: request_type.to_string(),
            request_id: request_id.to_string(),
            request_data,
        });
        transport.send(self.codec.encode(&request)?).await?;
        tracing::debug!(request_type, request_id, "sent request");

        let text = receive_within(transport, self.timeout).await?;
        let reply = match self.codec.decode(&text)? {
            Message::RequestResponse(reply) => reply,
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    expected: "RequestResponse",
                    got: other.name(),
                }
                .into())
            }
        };

        if reply.request_id != request_id {
            return Err(ProtocolError::RequestIdMismatch {
                sent: request_id.to_string(),
                received: reply.request_id,
            }
            .into());
        }

        if !reply.request_status.result {
            tracing::warn!(
                request_type,
                code = ?reply.request_status.code,
                comment = reply.request_status.comment.as_deref().unwrap_or(""),
                "request failed"
            );
            return Err(ClientError::RequestFailed {
                request_type: request_type.to_string(),
                code: reply.request_status.code,
                comment: reply.request_status.comment,
            });
        }

        tracing::debug!(request_type, request_id, "request succeeded");
        Ok(reply.response_data)
    }
}
