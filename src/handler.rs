use crate::connection::{ConnectionHandle, ConnectionInfo, ID};
use crate::error::{Error, HandlerError};
use crate::message::Message;
use log::error;
use std::panic::{self, AssertUnwindSafe};

/// Application callbacks driven by the server.
///
/// Every method runs inline on the connection's own task, so a slow callback delays only that
/// connection. Errors and panics coming out of `ready` and `received` are logged and dropped,
/// the connection keeps being served.
pub trait Handler: Send + Sync + 'static {
    /// Called during the handshake, before the upgrade response is written.
    /// Returning `false` declines the connection, and no upgrade happens.
    fn connected(&self, info: &ConnectionInfo) -> bool;

    /// Called once, right before the connection starts receiving frames.
    fn ready(&self, _connection: &ConnectionHandle) -> Result<(), HandlerError> {
        Ok(())
    }

    fn received(&self, connection: &ConnectionHandle, message: Message) -> Result<(), HandlerError>;

    /// Reports the protocol error that is about to end the connection.
    fn failed(&self, _connection: &ConnectionHandle, _error: Error) {}

    /// Called exactly once, when the connection is gone.
    fn disconnected(&self, _connection: &ConnectionHandle) {}
}

// Fault isolation boundary around application code: errors and panics are logged and turned
// into None, they never unwind into the connection loop
pub(crate) fn call_guarded<T, F>(callback: &str, id: ID, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T, HandlerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            error!("{} callback failed for connection {}: {}", callback, id, err);
            None
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("unknown panic"));
            error!("{} callback panicked for connection {}: {}", callback, id, reason);
            None
        }
    }
}
