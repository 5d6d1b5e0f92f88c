use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use uuid::Uuid;

pub(crate) const UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a client key,
/// `base64(SHA1(key + GUID))` as defined by RFC6455.
pub fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

// Used for generating a new UUID, every time a new client connects the server
pub(crate) fn generate_new_uuid() -> Uuid {
    let buf = rand::random::<[u8; 16]>();

    Uuid::new_v8(buf)
}
