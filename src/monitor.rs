use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

use crate::constants::PORT_MONITOR_INTERVAL_MS;
use crate::error::PicResult;
use crate::interface::{ComPort, PortEnumerator};

/// Difference between two consecutive port listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortChange {
    pub current: Vec<ComPort>,
    pub added: Vec<ComPort>,
    pub removed: Vec<ComPort>,
}

/// Polls the port list on a background thread and reports changes.
/// The first poll reports every present port as added.
pub struct PortMonitor {
    changes: Receiver<PortChange>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PortMonitor {
    pub fn start(enumerator: Arc<dyn PortEnumerator>) -> PicResult<Self> {
        Self::with_interval(enumerator, Duration::from_millis(PORT_MONITOR_INTERVAL_MS))
    }

    pub fn with_interval(enumerator: Arc<dyn PortEnumerator>, interval: Duration) -> PicResult<Self> {
        let (changes_tx, changes) = unbounded();
        let (stop, stop_rx) = unbounded::<()>();

        let worker = thread::Builder::new()
            .name("port monitor".to_string())
            .spawn(move || watch_ports(enumerator, interval, changes_tx, stop_rx))?;

        Ok(Self {
            changes,
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    pub fn changes(&self) -> &Receiver<PortChange> {
        &self.changes
    }

    pub fn stop(self) {}
}

impl Drop for PortMonitor {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the worker immediately
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Port monitor thread panicked");
            }
        }
    }
}

fn watch_ports(
    enumerator: Arc<dyn PortEnumerator>,
    interval: Duration,
    changes: Sender<PortChange>,
    stop: Receiver<()>,
) {
    let mut last = BTreeSet::new();

    loop {
        match enumerator.ports() {
            Ok(ports) => {
                let current: BTreeSet<ComPort> = ports.into_iter().map(|p| p.name).collect();
                if current != last {
                    let change = PortChange {
                        current: current.iter().cloned().collect(),
                        added: current.difference(&last).cloned().collect(),
                        removed: last.difference(&current).cloned().collect(),
                    };
                    debug!("Ports changed: +{:?} -{:?}", change.added, change.removed);
                    if changes.send(change).is_err() {
                        break;
                    }
                    last = current;
                }
            }
            Err(e) => warn!("Port monitoring error: {}", e),
        }

        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
    debug!("Port monitor stopped");
}
