use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

/// Set of serial ports currently owned by a probe or a running operation.
/// Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct PortLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl PortLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take exclusive ownership of `port`, or `None` if someone holds it
    pub fn try_acquire(&self, port: &str) -> Option<PortLease> {
        if !self.set().insert(port.to_string()) {
            return None;
        }
        trace!("Acquired port {}", port);
        Some(PortLease {
            locks: self.clone(),
            port: port.to_string(),
        })
    }

    pub fn is_held(&self, port: &str) -> bool {
        self.set().contains(port)
    }

    pub fn held_ports(&self) -> Vec<String> {
        let mut ports: Vec<_> = self.set().iter().cloned().collect();
        ports.sort();
        ports
    }
}

/// Exclusive ownership of one port; released on drop
#[derive(Debug)]
pub struct PortLease {
    locks: PortLocks,
    port: String,
}

impl PortLease {
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.locks.set().remove(&self.port);
        trace!("Released port {}", self.port);
    }
}
