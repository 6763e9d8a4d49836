//! Interpretation of backend output
//!
//! The backend has no structured status channel, only an exit code and free
//! text. Every text heuristic used to judge a run lives here.

use super::operation::{OperationStatus, OutputLine};

/// Phrases meaning the programmer or the chip did not cooperate
const DEVICE_PATTERNS: &[&str] = &[
    "device not found",
    "programmer not found",
    "no programmer",
    "no response",
    "not responding",
    "chip not found",
    "chip not detected",
    "no chip",
    "wrong chip",
    "unexpected chip",
    "could not open port",
    "failed to open port",
    "port not found",
    "timeout",
    "timed out",
];

/// Phrases meaning the backend itself is missing
const BACKEND_MISSING_PATTERNS: &[&str] = &["command not found", "is not recognized as"];

/// A verify that ran to the end but found differences
const MISMATCH_PATTERNS: &[&str] = &[
    "verification failed",
    "verify failed",
    "mismatch",
];

/// The operation did not happen, whatever the exit code says
const FAILURE_PATTERNS: &[&str] = &["failed", "error", "unable to", "invalid", "locked"];

const WARNING_PATTERNS: &[&str] = &["warning"];

/// Shell exit status for a command it could not find
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Classify a finished run from its exit code and combined output.
/// Best-effort: backend wording can change between versions.
pub fn classify(exit_code: Option<i32>, output: &[OutputLine]) -> OperationStatus {
    let lines: Vec<String> = output.iter().map(|line| line.text.to_lowercase()).collect();
    let matches = |line: &str, patterns: &[&str]| patterns.iter().any(|p| line.contains(p));
    let mentions = |patterns: &[&str]| lines.iter().any(|line| matches(line, patterns));

    match exit_code {
        Some(0) => {
            // Mismatch lines say "failed" too, they are judged on their own
            let failed = lines
                .iter()
                .any(|line| !matches(line, MISMATCH_PATTERNS) && matches(line, FAILURE_PATTERNS));

            if mentions(DEVICE_PATTERNS) {
                OperationStatus::DeviceError
            } else if failed {
                OperationStatus::UnknownFailure
            } else if mentions(MISMATCH_PATTERNS) || mentions(WARNING_PATTERNS) {
                OperationStatus::SuccessWithWarnings
            } else {
                OperationStatus::Success
            }
        }
        Some(EXIT_COMMAND_NOT_FOUND) => OperationStatus::BackendNotFound,
        _ => {
            if mentions(DEVICE_PATTERNS) {
                OperationStatus::DeviceError
            } else if mentions(BACKEND_MISSING_PATTERNS) {
                OperationStatus::BackendNotFound
            } else {
                OperationStatus::UnknownFailure
            }
        }
    }
}
