use rustls::ServerConfig as RustlsConfig;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SERVER_NAME: &str = "ws-pipe";

/// Server wide settings, shared by every accepted connection.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub web_socket_config: WebSocketConfig,
    pub tls_config: Option<Arc<RustlsConfig>>,
    /// Value of the `Server` line in the upgrade response.
    pub server_name: String,
    /// When enabled, every received frame refreshes the connection liveness,
    /// not only pongs.
    pub smart_keepalive: bool,
    /// Starts a heartbeat tracker for the server when set.
    pub heartbeat: Option<HeartbeatConfig>,
    /// Max time a client has to send the whole HTTP request head.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            web_socket_config: WebSocketConfig::default(),
            tls_config: None,
            server_name: String::from(DEFAULT_SERVER_NAME),
            smart_keepalive: true,
            heartbeat: None,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: Option<usize>,
    pub max_message_size: Option<usize>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: Some(64 << 20),
            max_frame_size: Some(16 << 20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often the tracker sweeps its connections.
    pub interval: Duration,
    /// A connection idle for longer than this gets closed.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}
