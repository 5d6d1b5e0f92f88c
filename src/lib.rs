//! WebSocket protocol layer for a multi-protocol server.
//!
//! A connection first arrives speaking HTTP. If it asks for an upgrade, the handshake
//! negotiator answers with `101 Switching Protocols` and pins the stream to this protocol
//! ("pipe mode"). From then on a dispatch loop owned by the connection reads frames one at a time,
//! decrypts content frames with the connection's own encryptors, and routes them by opcode:
//! content goes to the application [`handler::Handler`], pings are answered, pongs refresh the
//! liveness tracker, and a close frame ends the connection.
//!
//! It's an async library based on tokio runtime, following the
//! [WebSocket Protocol RFC](https://datatracker.ietf.org/doc/html/rfc6455) for the handshake
//! and framing.
//!
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod encryptor;
pub mod error;
pub mod event;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod heartbeat;
pub mod lifecycle;
pub mod message;
pub mod read;
pub mod request;
pub mod server;
pub mod stream;
pub mod utils;
mod write;
