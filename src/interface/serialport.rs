use std::time::Duration;

use tracing::{debug, trace};

use super::{PortEnumerator, PortInfo, PortProber, ProbeOutcome, UsbId};
use crate::constants::PROBE_BAUD_RATE;
use crate::error::{PicError, PicResult};

/// Host serial ports, backed by the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> PicResult<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(|e| {
            PicError::Communication(format!("Could not get available ports. Err {:?}", e))
        })?;

        Ok(ports
            .into_iter()
            .map(|port| {
                let (usb_id, description) = match port.port_type {
                    serialport::SerialPortType::UsbPort(info) => {
                        let description = info
                            .product
                            .or(info.manufacturer)
                            .unwrap_or_else(|| "USB serial".to_string());
                        (
                            Some(UsbId {
                                vid: info.vid,
                                pid: info.pid,
                            }),
                            Some(description),
                        )
                    }
                    serialport::SerialPortType::BluetoothPort => {
                        (None, Some("Bluetooth".to_string()))
                    }
                    serialport::SerialPortType::PciPort => (None, Some("PCI".to_string())),
                    serialport::SerialPortType::Unknown => (None, None),
                };
                trace!("Found port {} ({:?})", port.port_name, usb_id);
                PortInfo {
                    name: port.port_name,
                    usb_id,
                    description,
                }
            })
            .collect())
    }
}

impl PortProber for SystemPorts {
    fn probe(&self, port: &str, timeout: Duration) -> ProbeOutcome {
        // Opening is enough: the port is closed again when the handle drops
        match serialport::new(port, PROBE_BAUD_RATE)
            .timeout(timeout)
            .dtr_on_open(false)
            .open()
        {
            Ok(_handle) => {
                debug!("Opened {} for probing", port);
                ProbeOutcome::Responsive
            }
            Err(e) => {
                debug!("Could not open {}: {}", port, e);
                ProbeOutcome::Failed(e.to_string())
            }
        }
    }
}
