//! Front-end for K150 compatible PIC programmers
//!
//! `picman` finds the serial port a programmer sits on and drives the
//! external `picpro` (or `picp`) backend to program, verify, erase and dump
//! PIC microcontrollers.
//!
//! ```no_run
//! use picman::{Detector, DetectorOptions, Dispatcher, OperationRequest};
//!
//! let detector = Detector::new(DetectorOptions::default());
//! if let Some(candidate) = detector.best_candidate()? {
//!     let dispatcher = Dispatcher::new("picpro");
//!     let result = dispatcher.execute(OperationRequest::program(
//!         "16F628A",
//!         &candidate.port,
//!         "blink.hex",
//!     ));
//!     println!("{:?}", result.status);
//! }
//! # Ok::<(), picman::error::PicError>(())
//! ```

pub mod backend;
pub mod chips;
pub mod config;
pub(crate) mod constants;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod hex;
pub mod i18n;
pub mod interface;
pub mod monitor;
pub mod util;

pub use backend::{Backend, BackendKind, BackendSearch, BackendSelection};
pub use chips::{ChipDescriptor, ChipFamily, find_chip, supported_chips};
pub use config::{Context, Settings};
pub use detector::{Confidence, Detector, DetectorOptions, PortCandidate};
pub use dispatcher::{
    CancelToken, Dispatcher, MemoryRegion, OperationEvent, OperationHandle, OperationKind,
    OperationRequest, OperationResult, OperationStatus, OutputLine,
};
pub use error::{PicError, PicResult, PreconditionError};
pub use i18n::{Language, Message};
pub use monitor::{PortChange, PortMonitor};
