//! Serial port scanning for attached programmers
//!
//! A detection pass lists the host's serial ports and rates each one by how
//! likely it is to have a K150 compatible programmer behind it:
//!
//! - **High**: the USB id matches an adapter chip known to be used on K150
//!   boards
//! - **Medium**: the port description mentions a common USB-serial bridge
//! - **Low**: anything else, or a port that could not be opened in time
//!
//! When probing is enabled each port is briefly opened. The probe runs on its
//! own thread and is abandoned once the timeout passes, so one hung driver
//! cannot stall the whole scan. Ports held by a running operation are never
//! probed.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::{debug, warn};

use crate::constants::DEFAULT_PROBE_TIMEOUT_MS;
use crate::error::PicResult;
use crate::interface::{
    ComPort, PortEnumerator, PortInfo, PortLease, PortLocks, PortProber, ProbeOutcome,
    SystemPorts, UsbId,
};

/// USB-serial bridges found on K150/K128/K149/K182 programmers
pub const KNOWN_PROGRAMMERS: &[(UsbId, &str)] = &[
    (
        UsbId {
            vid: 0x1A86,
            pid: 0x7523,
        },
        "CH340 Serial (Common for K150)",
    ),
    (
        UsbId {
            vid: 0x0403,
            pid: 0x6001,
        },
        "FTDI Serial (Some K150 variants)",
    ),
    (
        UsbId {
            vid: 0x10C4,
            pid: 0xEA60,
        },
        "Silicon Labs CP210x (Some programmers)",
    ),
    (
        UsbId {
            vid: 0x067B,
            pid: 0x2303,
        },
        "Prolific PL2303 (Older programmers)",
    ),
];

const DESCRIPTION_KEYWORDS: &[&str] = &["ch340", "ch341", "usb-serial", "ftdi", "cp210", "pl2303"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One serial port seen during a detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub port: ComPort,
    pub usb_id: Option<UsbId>,
    pub description: Option<String>,
    pub device_type: Option<&'static str>,
    pub confidence: Confidence,

    /// Why a probe failed, if it did
    pub error: Option<String>,

    /// Held by a running operation, so it was not probed
    pub busy: bool,
}

impl PortCandidate {
    /// A usable programmer port: well rated, openable and not in use
    pub fn is_likely_programmer(&self) -> bool {
        self.confidence >= Confidence::Medium && self.error.is_none() && !self.busy
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorOptions {
    /// Open each port to check it responds
    pub probe: bool,

    /// Upper bound on a single port probe
    pub probe_timeout: Duration,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            probe: false,
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

pub struct Detector {
    enumerator: Arc<dyn PortEnumerator>,
    prober: Arc<dyn PortProber>,
    locks: PortLocks,
    options: DetectorOptions,
}

impl Detector {
    /// Detector over the host's real serial ports
    pub fn new(options: DetectorOptions) -> Self {
        Self::with_sources(Arc::new(SystemPorts), Arc::new(SystemPorts), options)
    }

    pub fn with_sources(
        enumerator: Arc<dyn PortEnumerator>,
        prober: Arc<dyn PortProber>,
        options: DetectorOptions,
    ) -> Self {
        Self {
            enumerator,
            prober,
            locks: PortLocks::new(),
            options,
        }
    }

    /// Share port ownership with a dispatcher so busy ports are skipped
    pub fn with_port_locks(mut self, locks: PortLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn options(&self) -> DetectorOptions {
        self.options
    }

    /// Start a new detection pass. Ports are listed up front; identification
    /// and probing happen lazily as the pass is iterated.
    pub fn detect(&self) -> PicResult<DetectionPass<'_>> {
        let ports = self.enumerator.ports()?;
        debug!("Scanning {} serial ports", ports.len());
        Ok(DetectionPass {
            detector: self,
            ports: ports.into_iter(),
        })
    }

    /// Run a full pass and pick the most likely programmer port
    pub fn best_candidate(&self) -> PicResult<Option<PortCandidate>> {
        let mut candidates: Vec<_> = self
            .detect()?
            .filter(PortCandidate::is_likely_programmer)
            .collect();
        // Stable sort keeps enumeration order among equals
        candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        Ok(candidates.into_iter().next())
    }

    fn examine(&self, info: PortInfo) -> PortCandidate {
        let (confidence, device_type) = identify(&info);
        let mut candidate = PortCandidate {
            busy: self.locks.is_held(&info.name),
            port: info.name,
            usb_id: info.usb_id,
            description: info.description,
            device_type,
            confidence,
            error: None,
        };

        if !self.options.probe {
            return candidate;
        }

        let Some(lease) = self.locks.try_acquire(&candidate.port) else {
            debug!("Not probing {}, port is in use", candidate.port);
            candidate.busy = true;
            return candidate;
        };

        match self.probe_bounded(lease) {
            ProbeResult::Done(ProbeOutcome::Responsive) => {}
            ProbeResult::Done(ProbeOutcome::Failed(e)) => {
                candidate.confidence = Confidence::Low;
                candidate.error = Some(e);
            }
            ProbeResult::TimedOut => {
                warn!("Port {} did not respond to probe", candidate.port);
                candidate.confidence = Confidence::Low;
                candidate.error = Some(format!(
                    "No response within {} ms",
                    self.options.probe_timeout.as_millis()
                ));
            }
        }
        candidate
    }

    fn probe_bounded(&self, lease: PortLease) -> ProbeResult {
        let (tx, rx) = bounded(1);
        let prober = Arc::clone(&self.prober);
        let timeout = self.options.probe_timeout;

        let spawned = thread::Builder::new()
            .name(format!("probe {}", lease.port()))
            .spawn(move || {
                let outcome = prober.probe(lease.port(), timeout);
                drop(lease);
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return ProbeResult::Done(ProbeOutcome::Failed(format!(
                "Could not start probe thread: {}",
                e
            )));
        }

        match rx.recv_timeout(timeout) {
            Ok(outcome) => ProbeResult::Done(outcome),
            Err(_) => ProbeResult::TimedOut,
        }
    }
}

enum ProbeResult {
    Done(ProbeOutcome),
    TimedOut,
}

fn identify(info: &PortInfo) -> (Confidence, Option<&'static str>) {
    if let Some(usb_id) = info.usb_id {
        if let Some((_, name)) = KNOWN_PROGRAMMERS.iter().find(|(id, _)| *id == usb_id) {
            return (Confidence::High, Some(*name));
        }
    }

    let description = info
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if DESCRIPTION_KEYWORDS
        .iter()
        .any(|keyword| description.contains(keyword))
    {
        return (Confidence::Medium, Some("Possible programmer device"));
    }

    (Confidence::Low, None)
}

/// One lazily evaluated scan over the ports listed when it was created
pub struct DetectionPass<'a> {
    detector: &'a Detector,
    ports: std::vec::IntoIter<PortInfo>,
}

impl Iterator for DetectionPass<'_> {
    type Item = PortCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let info = self.ports.next()?;
        Some(self.detector.examine(info))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ports.size_hint()
    }
}

impl ExactSizeIterator for DetectionPass<'_> {}
