use std::path::PathBuf;

use thiserror::Error;

/// Reasons an operation is refused before any backend process is launched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("No serial port selected")]
    MissingPort,

    #[error("Unknown chip {0}")]
    UnknownChip(String),

    #[error("No HEX file selected")]
    MissingFile,

    #[error("HEX file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("HEX file is empty: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("No output file given")]
    MissingOutput,

    #[error("Port {0} is busy with another operation")]
    PortBusy(String),
}

#[derive(Error, Debug)]
pub enum PicError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Firmware error: {0}")]
    FirmwareError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PicResult<T> = std::result::Result<T, PicError>;
