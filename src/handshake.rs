use crate::config::ServerConfig;
use crate::connection::{ConnectionInfo, ConnectionState, Protocol, WSConnection};
use crate::encryptor::EncryptorRegistry;
use crate::handler::{call_guarded, Handler};
use crate::heartbeat::LivenessTracker;
use crate::utils::generate_websocket_accept_value;
use log::debug;
use std::sync::Arc;

pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";

/// Outcome of an upgrade attempt.
pub struct HandshakeResult {
    pub accepted: bool,
    /// Raw `101 Switching Protocols` response, to be written once and as-is.
    pub response: Vec<u8>,
    /// The connection is pinned to the WebSocket protocol from now on.
    pub pipe: bool,
    pub connection: Option<WSConnection>,
}

impl HandshakeResult {
    fn rejected() -> Self {
        Self {
            accepted: false,
            response: Vec::new(),
            pipe: false,
            connection: None,
        }
    }
}

pub fn build_accept_response(server_name: &str, accept_key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
        Server: {}\r\n\
        Connection: Upgrade\r\n\
        Upgrade: websocket\r\n\
        Sec-WebSocket-Accept: {}\r\n\
        \r\n",
        server_name, accept_key
    )
    .into_bytes()
}

/// Decides whether an HTTP connection gets upgraded to WebSocket, and sets up the connection
/// when it does.
pub struct Negotiator<H: Handler> {
    handler: Arc<H>,
    // Template only, every accepted connection gets its own clone
    encryptors: EncryptorRegistry,
    tracker: Option<Arc<dyn LivenessTracker>>,
    server_name: String,
    smart_keepalive: bool,
}

impl<H: Handler> Negotiator<H> {
    pub fn new(handler: Arc<H>, encryptors: EncryptorRegistry, config: &ServerConfig) -> Self {
        Self {
            handler,
            encryptors,
            tracker: None,
            server_name: config.server_name.clone(),
            smart_keepalive: config.smart_keepalive,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn LivenessTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub fn negotiate(&self, protocol: Protocol, info: ConnectionInfo) -> HandshakeResult {
        // Leave anything that isn't HTTP to the other protocol handlers
        if protocol != Protocol::Http {
            debug!("not upgrading a {:?} connection", protocol);
            return HandshakeResult::rejected();
        }

        let key = match info.request.get_header_value(SEC_WEBSOCKET_KEY) {
            Some(key) if !key.is_empty() => key,
            _ => {
                debug!("no {} header, not an upgrade request", SEC_WEBSOCKET_KEY);
                return HandshakeResult::rejected();
            }
        };

        let accept_key = generate_websocket_accept_value(&key);
        let response = build_accept_response(&self.server_name, &accept_key);

        let connection = WSConnection::new(info, self.encryptors.clone(), self.smart_keepalive);
        let handle = connection.handle().clone();

        let handler = self.handler.clone();
        let welcomed = call_guarded("connected", handle.id(), || {
            Ok(handler.connected(handle.info()))
        })
        .unwrap_or(false);

        if !welcomed {
            debug!("application declined connection {}", handle.id());
            return HandshakeResult::rejected();
        }

        handle.set_state(ConnectionState::Piped);

        if let Some(tracker) = &self.tracker {
            tracker.add(&handle);
        }

        let tracker = self.tracker.clone();
        let cleanup_handle = handle.clone();
        handle.cleanup().install(move || {
            let id = cleanup_handle.id();
            if let Some(tracker) = tracker {
                tracker.remove(id);
            }
            call_guarded("disconnected", id, || {
                handler.disconnected(&cleanup_handle);
                Ok(())
            });
        });

        HandshakeResult {
            accepted: true,
            response,
            pipe: true,
            connection: Some(connection),
        }
    }
}
