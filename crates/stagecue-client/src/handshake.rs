//! Hello / Identify / Identified handshake.
//!
//! Strict order, one receive and one send each:
//!   1. Hello from the server (may carry an auth challenge)
//!   2. Identify from us (token only if challenged, no event subscriptions)
//!   3. Identified from the server; anything else is a rejection
//!
//! No retries. On error the caller owns closing the transport.

use std::time::Duration;

use stagecue_protocol::{
    authentication_token, Identified, Identify, Message, MessageCodec, OpCode, ProtocolError,
    CLOSE_CODE_AUTHENTICATION_FAILED, EVENT_SUBSCRIPTION_NONE, RPC_VERSION,
};

use crate::transport::{receive_within, Transport};
use crate::{ClientError, TransportError};

/// Proof that the handshake completed. Only `handshake()` can build one, and
/// the correlator refuses to send without it.
#[derive(Debug)]
pub struct Ready {
    negotiated_rpc_version: u32,
}

impl Ready {
    pub fn negotiated_rpc_version(&self) -> u32 {
        self.negotiated_rpc_version
    }
}

pub async fn handshake<T: Transport>(
    transport: &mut T,
    secret: Option<&str>,
    codec: &MessageCodec,
    timeout: Duration,
) -> Result<Ready, ClientError> {
    // Hello
    let text = receive_within(transport, timeout).await?;
    let hello = match codec.decode(&text)? {
        Message::Hello(hello) => hello,
        other => {
            return Err(ProtocolError::UnexpectedMessage {
                expected: "Hello",
                got: other.name(),
            }
            .into())
        }
    };
    tracing::debug!(
        rpc_version = hello.rpc_version,
        server_version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        challenged = hello.authentication.is_some(),
        "received hello"
    );

    // An empty password counts as no password.
    let secret = secret.filter(|secret| !secret.is_empty());
    let authentication = match (&hello.authentication, secret) {
        (None, _) => None,
        (Some(_), None) => return Err(ClientError::AuthRequired),
        (Some(challenge), Some(secret)) => Some(authentication_token(
            secret,
            &challenge.salt,
            &challenge.challenge,
        )),
    };

    // Identify
    let identify = Message::Identify(Identify {
        rpc_version: RPC_VERSION,
        authentication,
        event_subscriptions: Some(EVENT_SUBSCRIPTION_NONE),
    });
    transport.send(codec.encode(&identify)?).await?;
    tracing::debug!("sent identify");

    // Identified
    let text = match receive_within(transport, timeout).await {
        Ok(text) => text,
        Err(TransportError::Closed {
            code: Some(CLOSE_CODE_AUTHENTICATION_FAILED),
            reason,
        }) => {
            return Err(ClientError::AuthRejected(format!(
                "server closed the connection: {reason}"
            )))
        }
        Err(e) => return Err(e.into()),
    };
    let envelope = codec
        .decode_envelope(&text)
        .map_err(|e| ClientError::AuthRejected(format!("unreadable acknowledgement: {e}")))?;
    if envelope.op != OpCode::Identified as u8 {
        return Err(ClientError::AuthRejected(format!(
            "expected Identified (op 2), got op {}",
            envelope.op
        )));
    }

    let negotiated_rpc_version = serde_json::from_value::<Identified>(envelope.d)
        .ok()
        .and_then(|identified| identified.negotiated_rpc_version)
        .unwrap_or(RPC_VERSION);

    Ok(Ready {
        negotiated_rpc_version,
    })
}
