use crate::encryptor::EncryptorRegistry;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::lifecycle::CleanupHook;
use crate::message::Message;
use crate::request::HttpRequest;
use crate::utils::generate_new_uuid;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use uuid::Uuid;

pub type ID = Uuid;

/// Protocol an accepted stream has been classified as by the server core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    /// The connection is owned by the WebSocket protocol, bypassing any other dispatch.
    Piped,
    Closed,
}

/// What the server knew about the peer when the upgrade was requested.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub peer_addr: Option<SocketAddr>,
    pub request: HttpRequest,
}

struct Shared {
    id: ID,
    info: ConnectionInfo,
    smart_keepalive: bool,
    state: Mutex<ConnectionState>,
    last_seen: Mutex<Instant>,
    registry: Mutex<EncryptorRegistry>,
    write_tx: UnboundedSender<Frame>,
    close_signal: Notify,
    cleanup: CleanupHook,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable view of a connection, handed to the application and to the liveness tracker.
///
/// It can queue outgoing frames and ask the connection to close, but it doesn't own the stream,
/// which stays with the dispatch loop serving the connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ID {
        self.shared.id
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.shared.info
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn smart_keepalive(&self) -> bool {
        self.shared.smart_keepalive
    }

    /// Refreshes the liveness timestamp.
    pub fn keepalive(&self) {
        *lock(&self.shared.last_seen) = Instant::now();
    }

    pub fn last_seen(&self) -> Instant {
        *lock(&self.shared.last_seen)
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen().elapsed()
    }

    pub fn send_message(&self, message: Message) -> Result<(), Error> {
        self.send_frame(Frame::new(true, message.opcode(), message.into_payload()))
    }

    pub fn send_text<S: Into<String>>(&self, text: S) -> Result<(), Error> {
        self.send_message(Message::Text(text.into()))
    }

    pub fn send_binary(&self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Binary(data))
    }

    /// Encrypts the message with this connection's encryptor `encryptor_id`, and sends it
    /// prefixed by the id byte.
    pub fn send_encrypted(&self, encryptor_id: u8, message: Message) -> Result<(), Error> {
        let opcode = message.opcode();
        let payload = lock(&self.shared.registry)
            .encrypt_payload(encryptor_id, &message.into_payload())?;
        self.send_frame(Frame::new(true, opcode, payload))
    }

    pub fn send_ping(&self) -> Result<(), Error> {
        self.send_frame(Frame::new(true, OpCode::Ping, Vec::new()))
    }

    pub(crate) fn send_frame(&self, frame: Frame) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.shared.write_tx.send(frame)?;
        Ok(())
    }

    /// Sends a Close frame and stops the dispatch loop, even when it's waiting on a read.
    /// Calling it on a closed connection does nothing.
    pub fn close(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }

        // The writer task may already be gone if the socket broke, nothing left to tell the peer
        let _ = self
            .shared
            .write_tx
            .send(Frame::new(true, OpCode::Close, Vec::new()));
        self.shared.close_signal.notify_one();
    }

    pub(crate) async fn closed(&self) {
        self.shared.close_signal.notified().await
    }

    pub(crate) fn cleanup(&self) -> &CleanupHook {
        &self.shared.cleanup
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *lock(&self.shared.state) = state;
    }

    pub(crate) fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        lock(&self.shared.registry).decrypt_payload(payload)
    }

    pub(crate) fn has_encryptors(&self) -> bool {
        lock(&self.shared.registry).has_any()
    }
}

/// A connection being served by the WebSocket protocol.
///
/// Created by the handshake negotiator and then owned by the dispatch loop, which is the only
/// one reading from its stream.
pub struct WSConnection {
    handle: ConnectionHandle,
    write_rx: Option<UnboundedReceiver<Frame>>,
}

impl WSConnection {
    pub fn new(info: ConnectionInfo, registry: EncryptorRegistry, smart_keepalive: bool) -> Self {
        // Unbounded, so the application and the dispatch loop never wait on a slow socket when
        // queueing frames
        let (write_tx, write_rx) = unbounded_channel();

        let shared = Shared {
            id: generate_new_uuid(),
            info,
            smart_keepalive,
            state: Mutex::new(ConnectionState::Handshaking),
            last_seen: Mutex::new(Instant::now()),
            registry: Mutex::new(registry),
            write_tx,
            close_signal: Notify::new(),
            cleanup: CleanupHook::new(),
        };

        Self {
            handle: ConnectionHandle {
                shared: Arc::new(shared),
            },
            write_rx: Some(write_rx),
        }
    }

    pub fn id(&self) -> ID {
        self.handle.id()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Queue of frames waiting to be written, taken once by whoever drives the write half.
    pub fn take_outgoing(&mut self) -> Option<UnboundedReceiver<Frame>> {
        self.write_rx.take()
    }
}
