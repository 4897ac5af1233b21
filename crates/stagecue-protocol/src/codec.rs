//! JSON text codec for WebSocket frames.
//!
//! Wire format: one UTF-8 text frame per envelope, `{"op": n, "d": {...}}`.
//! Framing is done by the WebSocket layer; this codec only bounds the size
//! and maps between text and `Message`.

use crate::messages::{Envelope, Message};
use crate::{ProtocolError, MAX_MESSAGE_BYTES};

/// Codec for turning Message values into text frames and back.
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    max_message_bytes: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self {
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

impl MessageCodec {
    pub fn with_limit(max_message_bytes: usize) -> Self {
        Self { max_message_bytes }
    }

    pub fn encode(&self, message: &Message) -> Result<String, ProtocolError> {
        let text = serde_json::to_string(&message.to_envelope()?)?;
        self.check_size(text.len())?;
        Ok(text)
    }

    /// Decode only the outer `{op, d}` shape without interpreting the payload.
    pub fn decode_envelope(&self, text: &str) -> Result<Envelope, ProtocolError> {
        self.check_size(text.len())?;
        Ok(serde_json::from_str(text)?)
    }

    pub fn decode(&self, text: &str) -> Result<Message, ProtocolError> {
        Message::from_envelope(self.decode_envelope(text)?)
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_message_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.max_message_bytes,
            });
        }
        Ok(())
    }
}
