//! Challenge-response token for the Identify message.
//!
//! token = base64(sha256(base64(sha256(secret + salt)) + challenge))
//!
//! Both concatenations are on strings (the second one on the base64 text of
//! the first digest), never on raw digest bytes. Standard base64 with padding.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

/// Derive the authentication token from the configured secret and the
/// server's per-connection salt and challenge.
pub fn authentication_token(secret: &str, salt: &str, challenge: &str) -> String {
    let base64_secret = sha256_base64(&[secret, salt]);
    sha256_base64(&[&base64_secret, challenge])
}

fn sha256_base64(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    BASE64.encode(hasher.finalize())
}
