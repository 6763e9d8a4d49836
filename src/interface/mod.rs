pub mod lease;
pub mod serialport;

use std::fmt;
use std::time::Duration;

use crate::error::PicResult;

pub use self::lease::{PortLease, PortLocks};
pub use self::serialport::SystemPorts;

pub type ComPort = String;

/// USB vendor/product id pair of a serial adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vid, self.pid)
    }
}

/// A serial port as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: ComPort,
    pub usb_id: Option<UsbId>,
    pub description: Option<String>,
}

/// Result of briefly opening a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The port opened and answered
    Responsive,

    /// Opening failed (permission denied, device busy, unplugged)
    Failed(String),
}

/// Source of the host's serial port list
pub trait PortEnumerator: Send + Sync {
    fn ports(&self) -> PicResult<Vec<PortInfo>>;
}

/// Non-destructive check that a port can be opened
pub trait PortProber: Send + Sync {
    /// Implementations should honour `timeout`, but callers enforce the
    /// bound themselves and may abandon a probe that overruns it.
    fn probe(&self, port: &str, timeout: Duration) -> ProbeOutcome;
}
