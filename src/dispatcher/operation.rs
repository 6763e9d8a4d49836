use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::chips::ChipDescriptor;
use crate::error::PreconditionError;
use crate::interface::ComPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Program,
    Verify,
    Erase,
    Dump,
}

impl OperationKind {
    /// Subcommand understood by the backend
    pub fn command(&self) -> &'static str {
        match self {
            OperationKind::Program => "program",
            OperationKind::Verify => "verify",
            OperationKind::Erase => "erase",
            OperationKind::Dump => "dump",
        }
    }

    /// Program and Verify read a HEX file
    pub fn needs_input_file(&self) -> bool {
        matches!(self, OperationKind::Program | OperationKind::Verify)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Memory area read by a dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRegion {
    #[default]
    Rom,
    Eeprom,
    Config,
}

impl MemoryRegion {
    pub fn as_arg(&self) -> &'static str {
        match self {
            MemoryRegion::Rom => "rom",
            MemoryRegion::Eeprom => "eeprom",
            MemoryRegion::Config => "config",
        }
    }
}

/// One user action to be carried out by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub kind: OperationKind,

    /// Chip part number, with or without the `PIC` prefix
    pub chip: String,

    pub port: ComPort,

    /// HEX input for Program/Verify, output file for Dump
    pub file: Option<PathBuf>,

    pub icsp: bool,

    /// `NAME:VALUE` fuse overrides, Program only
    pub fuses: Vec<String>,

    /// Dump only
    pub memory: MemoryRegion,

    /// Dump only: write raw binary instead of HEX
    pub binary: bool,
}

impl OperationRequest {
    pub fn new(kind: OperationKind, chip: impl Into<String>, port: impl Into<ComPort>) -> Self {
        Self {
            kind,
            chip: chip.into(),
            port: port.into(),
            file: None,
            icsp: false,
            fuses: Vec::new(),
            memory: MemoryRegion::default(),
            binary: false,
        }
    }

    pub fn program(chip: &str, port: &str, file: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Program, chip, port).with_file(file)
    }

    pub fn verify(chip: &str, port: &str, file: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Verify, chip, port).with_file(file)
    }

    pub fn erase(chip: &str, port: &str) -> Self {
        Self::new(OperationKind::Erase, chip, port)
    }

    pub fn dump(chip: &str, port: &str, memory: MemoryRegion, output: impl Into<PathBuf>) -> Self {
        let mut request = Self::new(OperationKind::Dump, chip, port).with_file(output);
        request.memory = memory;
        request
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_icsp(mut self, icsp: bool) -> Self {
        self.icsp = icsp;
        self
    }

    /// Accepts the free-form fuse text of a settings box: one `NAME:VALUE`
    /// per line, `#` comments and malformed lines are dropped
    pub fn with_fuses<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fuses = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with('#') && line.contains(':'))
            .collect();
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
}

/// Backend argument list for `request` against `chip`. Pure, so the exact
/// command line can be checked without launching anything.
pub fn backend_args(request: &OperationRequest, chip: &ChipDescriptor) -> Vec<String> {
    let mut args = vec![
        request.kind.command().to_string(),
        "-p".to_string(),
        request.port.clone(),
        "-t".to_string(),
        chip.part_number.to_string(),
    ];

    let file = request
        .file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());

    match request.kind {
        OperationKind::Program | OperationKind::Verify => {
            if let Some(file) = file {
                args.extend(["-i".to_string(), file]);
            }
        }
        OperationKind::Dump => {
            args.push(request.memory.as_arg().to_string());
            if let Some(file) = file {
                args.extend(["-o".to_string(), file]);
            }
            if request.binary {
                args.push("--binary".to_string());
            }
        }
        OperationKind::Erase => {}
    }

    if request.icsp {
        args.push("--icsp".to_string());
    }

    if request.kind == OperationKind::Program {
        for fuse in &request.fuses {
            args.extend(["--fuse".to_string(), fuse.clone()]);
        }
    }

    args
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line printed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Success,

    /// The backend finished but reported problems, e.g. a verify mismatch
    SuccessWithWarnings,

    /// The backend executable could not be started
    BackendNotFound,

    /// No answer from the programmer, or wrong/missing chip
    DeviceError,

    UnknownFailure,

    Cancelled,

    /// Refused before launch
    PreconditionFailed(PreconditionError),
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OperationStatus::Success | OperationStatus::SuccessWithWarnings
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub kind: OperationKind,
    pub port: ComPort,
    pub status: OperationStatus,

    /// `None` when the process never ran or was ended by a signal
    pub exit_code: Option<i32>,

    pub output: Vec<OutputLine>,
    pub elapsed: Duration,
}

impl OperationResult {
    pub fn precondition_failed(request: &OperationRequest, error: PreconditionError) -> Self {
        Self {
            kind: request.kind,
            port: request.port.clone(),
            status: OperationStatus::PreconditionFailed(error),
            exit_code: None,
            output: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// What the user can do about a failure
    pub fn hint(&self) -> Option<&'static str> {
        match self.status {
            OperationStatus::BackendNotFound => {
                Some("Install picpro (pip install picpro) or set the backend path")
            }
            OperationStatus::DeviceError => Some(
                "Check the programmer connection and that the chip is seated correctly in the socket",
            ),
            OperationStatus::SuccessWithWarnings => Some("Review the backend output above"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chips::find_chip;

    fn args(request: &OperationRequest) -> Vec<String> {
        let chip = find_chip(&request.chip).unwrap();
        backend_args(request, chip)
    }

    #[test]
    fn program_args() {
        let request = OperationRequest::program("PIC16F628A", "COM3", "blink.hex")
            .with_icsp(true)
            .with_fuses(["# comment", "CONFIG1:0x3F4A", "", "garbage"]);
        assert_eq!(
            args(&request),
            vec![
                "program", "-p", "COM3", "-t", "16F628A", "-i", "blink.hex", "--icsp", "--fuse",
                "CONFIG1:0x3F4A"
            ]
        );
    }

    #[test]
    fn verify_ignores_fuses() {
        let request =
            OperationRequest::verify("12F675", "/dev/ttyUSB0", "a.hex").with_fuses(["FOSC:0x1"]);
        assert_eq!(
            args(&request),
            vec!["verify", "-p", "/dev/ttyUSB0", "-t", "12F675", "-i", "a.hex"]
        );
    }

    #[test]
    fn dump_args() {
        let request = OperationRequest::dump("18F4550", "COM1", MemoryRegion::Eeprom, "out.bin")
            .with_binary(true);
        assert_eq!(
            args(&request),
            vec![
                "dump", "-p", "COM1", "-t", "18F4550", "eeprom", "-o", "out.bin", "--binary"
            ]
        );
    }

    #[test]
    fn erase_args() {
        let request = OperationRequest::erase("16f84a", "COM2");
        assert_eq!(args(&request), vec!["erase", "-p", "COM2", "-t", "16F84A"]);
    }

    #[test]
    fn only_successes_count_as_success() {
        assert!(OperationStatus::SuccessWithWarnings.is_success());
        assert!(!OperationStatus::Cancelled.is_success());
        assert!(!OperationStatus::PreconditionFailed(PreconditionError::MissingFile).is_success());
    }
}
