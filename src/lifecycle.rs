use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

type Cleanup = Box<dyn FnOnce() + Send>;

/// One-shot cleanup action attached to a connection.
///
/// The loop may end from several places at once (a terminate frame, a read error, the
/// heartbeat closing an idle connection, a server shutdown), every one of them calls
/// [`CleanupHook::fire`], and only the first call runs the action.
pub struct CleanupHook {
    fired: AtomicBool,
    action: Mutex<Option<Cleanup>>,
}

impl CleanupHook {
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            action: Mutex::new(None),
        }
    }

    /// Installs the action. Returns false, leaving the first action in place, if one was
    /// already installed or the hook already fired.
    pub fn install<F: FnOnce() + Send + 'static>(&self, action: F) -> bool {
        if self.fired.load(Ordering::Acquire) {
            return false;
        }
        match self.action.lock() {
            Ok(mut slot) if slot.is_none() => {
                *slot = Some(Box::new(action));
                true
            }
            _ => false,
        }
    }

    /// Runs the action if this is the first call, returns whether it ran.
    pub fn fire(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        // A poisoned lock still holds a valid Option, the action is taken either way
        let action = match self.action.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Default for CleanupHook {
    fn default() -> Self {
        Self::new()
    }
}
