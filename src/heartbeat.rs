use crate::config::HeartbeatConfig;
use crate::connection::{ConnectionHandle, ID};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Liveness service watching every piped connection.
///
/// It's shared by all the connection loops of a server, so implementations must take care of
/// their own synchronization.
pub trait LivenessTracker: Send + Sync {
    fn add(&self, connection: &ConnectionHandle);
    fn remove(&self, id: ID);
}

/// Default tracker: pings every connection on each sweep, and closes the ones that didn't show
/// any activity within the configured timeout.
pub struct Heartbeat {
    config: HeartbeatConfig,
    connections: Mutex<HashMap<ID, ConnectionHandle>>,
}

impl Heartbeat {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<ID, ConnectionHandle>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.connections().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections().is_empty()
    }

    pub fn contains(&self, id: &ID) -> bool {
        self.connections().contains_key(id)
    }

    /// Runs one pass over the tracked connections, returning how many were closed.
    pub fn sweep(&self) -> usize {
        // Handles are cloned out, so closing a connection never happens while holding the lock,
        // as its cleanup calls back into remove
        let snapshot: Vec<ConnectionHandle> = self.connections().values().cloned().collect();

        let mut closed = 0;
        for connection in snapshot {
            if connection.idle_for() > self.config.timeout {
                warn!(
                    "connection {} idle for {:?}, closing it",
                    connection.id(),
                    connection.idle_for()
                );
                connection.close();
                closed += 1;
            } else if let Err(err) = connection.send_ping() {
                debug!("couldn't ping connection {}: {}", connection.id(), err);
            }
        }
        closed
    }

    /// Closes every tracked connection, used when the server shuts down.
    pub fn close_all(&self) {
        let snapshot: Vec<ConnectionHandle> = self.connections().values().cloned().collect();
        for connection in snapshot {
            connection.close();
        }
    }

    /// Spawns the background sweeper. It stops by itself once every reference to the tracker
    /// is dropped.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::downgrade(self);
        let period = self.config.interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match tracker.upgrade() {
                    Some(tracker) => {
                        tracker.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}

impl LivenessTracker for Heartbeat {
    fn add(&self, connection: &ConnectionHandle) {
        self.connections()
            .insert(connection.id(), connection.clone());
    }

    fn remove(&self, id: ID) {
        self.connections().remove(&id);
    }
}
