//! Runs programmer operations through the external backend
//!
//! A [`Dispatcher`] checks each [`OperationRequest`] before anything is
//! launched, then runs the backend on a worker thread so the caller stays
//! responsive. Output lines and the final [`OperationResult`] arrive over a
//! channel on the returned [`OperationHandle`]; [`Dispatcher::execute`] and
//! [`Dispatcher::execute_streaming`] wrap that for blocking callers.
//!
//! Each port can carry one running operation at a time. The port stays
//! owned until the backend process has exited, including after a
//! cancellation.

pub mod classify;
pub mod launcher;
pub mod operation;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, error, info, warn};

use crate::chips::{ChipDescriptor, chip_for_name};
use crate::constants::{OUTPUT_DRAIN_GRACE_MS, WORKER_POLL_INTERVAL_MS};
use crate::error::PreconditionError;
use crate::interface::{ComPort, PortLease, PortLocks};

pub use classify::classify;
pub use launcher::{BackendProcess, Launcher, ProcessExit, SystemLauncher};
pub use operation::{
    MemoryRegion, OperationKind, OperationRequest, OperationResult, OperationStatus, OutputLine,
    OutputStream, backend_args,
};

/// Progress of one running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    Started {
        port: ComPort,
        command_line: String,
    },
    Output(OutputLine),
    Finished(OperationResult),
}

/// Requests cancellation of a running operation; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A running operation
pub struct OperationHandle {
    kind: OperationKind,
    port: ComPort,
    events: Receiver<OperationEvent>,
    cancel: CancelToken,
    worker: Worker,
}

enum Worker {
    Running(JoinHandle<OperationResult>),
    Failed(OperationResult),
}

impl OperationHandle {
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Started, output and finished events, in order
    pub fn events(&self) -> &Receiver<OperationEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        info!("Cancelling {} on {}", self.kind, self.port);
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Worker::Running(worker) => worker.is_finished(),
            Worker::Failed(_) => true,
        }
    }

    /// Block until the operation ends
    pub fn wait(self) -> OperationResult {
        let worker = match self.worker {
            Worker::Running(worker) => worker,
            Worker::Failed(result) => return result,
        };
        match worker.join() {
            Ok(result) => result,
            Err(_) => {
                error!("Worker for {} on {} panicked", self.kind, self.port);
                OperationResult {
                    kind: self.kind,
                    port: self.port,
                    status: OperationStatus::UnknownFailure,
                    exit_code: None,
                    output: Vec::new(),
                    elapsed: Duration::ZERO,
                }
            }
        }
    }
}

pub struct Dispatcher {
    program: PathBuf,
    launcher: Arc<dyn Launcher>,
    ports: PortLocks,
}

impl Dispatcher {
    /// Dispatcher running `program` as the backend executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_launcher(program, Arc::new(SystemLauncher))
    }

    pub fn with_launcher(program: impl Into<PathBuf>, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            program: program.into(),
            launcher,
            ports: PortLocks::new(),
        }
    }

    /// Share port ownership with a detector or another dispatcher
    pub fn with_port_locks(mut self, ports: PortLocks) -> Self {
        self.ports = ports;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn port_locks(&self) -> PortLocks {
        self.ports.clone()
    }

    pub fn is_port_busy(&self, port: &str) -> bool {
        self.ports.is_held(port)
    }

    fn check(
        &self,
        request: &OperationRequest,
    ) -> Result<(&'static ChipDescriptor, PortLease), PreconditionError> {
        if request.port.trim().is_empty() {
            return Err(PreconditionError::MissingPort);
        }
        let chip = chip_for_name(&request.chip)?;

        match (request.kind, &request.file) {
            (OperationKind::Program | OperationKind::Verify, None) => {
                return Err(PreconditionError::MissingFile);
            }
            (OperationKind::Program | OperationKind::Verify, Some(file)) => {
                let metadata = std::fs::metadata(file)
                    .map_err(|_| PreconditionError::FileNotFound(file.clone()))?;
                if !metadata.is_file() {
                    return Err(PreconditionError::FileNotFound(file.clone()));
                }
                if metadata.len() == 0 {
                    return Err(PreconditionError::EmptyFile(file.clone()));
                }
            }
            (OperationKind::Dump, None) => return Err(PreconditionError::MissingOutput),
            (OperationKind::Dump, Some(_)) | (OperationKind::Erase, _) => {}
        }

        let lease = self
            .ports
            .try_acquire(&request.port)
            .ok_or_else(|| PreconditionError::PortBusy(request.port.clone()))?;

        Ok((chip, lease))
    }

    /// Validate `request` and start it on a worker thread. Nothing is
    /// launched when a precondition fails.
    pub fn start(&self, request: OperationRequest) -> Result<OperationHandle, PreconditionError> {
        let (chip, lease) = self.check(&request).inspect_err(|e| {
            warn!("Refusing {} on {}: {}", request.kind, request.port, e);
        })?;

        let args = backend_args(&request, chip);
        let (events_tx, events) = unbounded();
        let cancel = CancelToken::default();

        let job = Job {
            kind: request.kind,
            program: self.program.clone(),
            args,
            launcher: Arc::clone(&self.launcher),
            cancel: cancel.clone(),
            events: events_tx,
        };

        let spawned = thread::Builder::new()
            .name(format!("{} {}", request.kind, request.port))
            .spawn(move || job.run(lease));

        let worker = match spawned {
            Ok(worker) => Worker::Running(worker),
            Err(e) => {
                // The job and its lease were dropped, so the port is free again
                error!("Could not start worker thread: {}", e);
                Worker::Failed(OperationResult {
                    kind: request.kind,
                    port: request.port.clone(),
                    status: OperationStatus::UnknownFailure,
                    exit_code: None,
                    output: vec![OutputLine::stderr(format!("Could not start worker: {}", e))],
                    elapsed: Duration::ZERO,
                })
            }
        };

        Ok(OperationHandle {
            kind: request.kind,
            port: request.port,
            events,
            cancel,
            worker,
        })
    }

    /// Run `request` to completion
    pub fn execute(&self, request: OperationRequest) -> OperationResult {
        self.execute_streaming(request, |_| {})
    }

    /// Run `request` to completion, handing each output line to `on_line`
    /// as soon as it arrives
    pub fn execute_streaming<F>(&self, request: OperationRequest, mut on_line: F) -> OperationResult
    where
        F: FnMut(&OutputLine),
    {
        let handle = match self.start(request.clone()) {
            Ok(handle) => handle,
            Err(e) => return OperationResult::precondition_failed(&request, e),
        };

        for event in handle.events().iter() {
            match event {
                OperationEvent::Output(line) => on_line(&line),
                OperationEvent::Finished(_) => break,
                OperationEvent::Started { .. } => {}
            }
        }
        handle.wait()
    }
}

struct Job {
    kind: OperationKind,
    program: PathBuf,
    args: Vec<String>,
    launcher: Arc<dyn Launcher>,
    cancel: CancelToken,
    events: Sender<OperationEvent>,
}

enum Outcome {
    Exited(ProcessExit),
    Cancelled,
    LaunchFailed(OperationStatus),
    Lost,
}

impl Job {
    fn run(self, lease: PortLease) -> OperationResult {
        let started = Instant::now();
        let port = lease.port().to_string();
        let mut output = Vec::new();

        let outcome = self.supervise(&port, &mut output);
        // Free the port before anyone can observe the result
        drop(lease);

        let (status, exit_code) = match outcome {
            Outcome::Exited(exit) => (classify(exit.code, &output), exit.code),
            Outcome::Cancelled => (OperationStatus::Cancelled, None),
            Outcome::LaunchFailed(status) => (status, None),
            Outcome::Lost => (OperationStatus::UnknownFailure, None),
        };
        info!(
            "{} on {} finished: {:?} (exit code {:?})",
            self.kind, port, status, exit_code
        );

        let result = OperationResult {
            kind: self.kind,
            port,
            status,
            exit_code,
            output,
            elapsed: started.elapsed(),
        };
        let _ = self.events.send(OperationEvent::Finished(result.clone()));
        result
    }

    fn record(&self, output: &mut Vec<OutputLine>, line: OutputLine) {
        let _ = self.events.send(OperationEvent::Output(line.clone()));
        output.push(line);
    }

    fn supervise(&self, port: &str, output: &mut Vec<OutputLine>) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }

        let command_line = format!("{} {}", self.program.display(), self.args.join(" "));
        info!("Executing: {}", command_line);

        let mut process = match self.launcher.launch(&self.program, &self.args) {
            Ok(process) => process,
            Err(e) => {
                let status = if e.kind() == std::io::ErrorKind::NotFound {
                    OperationStatus::BackendNotFound
                } else {
                    OperationStatus::UnknownFailure
                };
                warn!("Could not launch {}: {}", self.program.display(), e);
                self.record(
                    output,
                    OutputLine::stderr(format!("Could not launch {}: {}", self.program.display(), e)),
                );
                return Outcome::LaunchFailed(status);
            }
        };
        let _ = self.events.send(OperationEvent::Started {
            port: port.to_string(),
            command_line,
        });

        let lines = process.take_output();
        let mut streaming = lines.is_some();
        let poll = Duration::from_millis(WORKER_POLL_INTERVAL_MS);

        let exit = loop {
            if self.cancel.is_cancelled() {
                if let Err(e) = process.kill() {
                    warn!("Could not kill backend: {}", e);
                }
                if let Err(e) = process.wait() {
                    warn!("Could not reap backend: {}", e);
                }
                return Outcome::Cancelled;
            }

            match lines.as_ref().filter(|_| streaming) {
                Some(rx) => match rx.recv_timeout(poll) {
                    Ok(line) => {
                        self.record(output, line);
                        continue;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streaming = false,
                },
                None => thread::sleep(poll),
            }

            match process.try_wait() {
                Ok(Some(exit)) => break exit,
                Ok(None) => {}
                Err(e) => {
                    error!("Lost track of backend process: {}", e);
                    if let Err(e) = process.kill() {
                        warn!("Could not kill backend: {}", e);
                    }
                    if let Err(e) = process.wait() {
                        warn!("Could not reap backend: {}", e);
                    }
                    return Outcome::Lost;
                }
            }
        };

        // Lines still buffered after exit. A grandchild holding the pipe open
        // must not keep the operation alive, hence the grace period.
        if let Some(rx) = lines.as_ref().filter(|_| streaming) {
            let grace = Duration::from_millis(OUTPUT_DRAIN_GRACE_MS);
            while let Ok(line) = rx.recv_timeout(grace) {
                self.record(output, line);
            }
        }
        debug!("Backend exited with {:?}", exit.code);
        Outcome::Exited(exit)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    struct NeverLaunch;

    impl Launcher for NeverLaunch {
        fn launch(&self, _: &Path, _: &[String]) -> io::Result<Box<dyn BackendProcess>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::with_launcher("picpro", Arc::new(NeverLaunch))
    }

    #[test]
    fn missing_port_is_refused() {
        let result = dispatcher().execute(OperationRequest::erase("16F84A", "  "));
        assert_eq!(
            result.status,
            OperationStatus::PreconditionFailed(PreconditionError::MissingPort)
        );
    }

    #[test]
    fn unknown_chip_is_refused() {
        let result = dispatcher().execute(OperationRequest::erase("16F9999", "COM1"));
        assert_eq!(
            result.status,
            OperationStatus::PreconditionFailed(PreconditionError::UnknownChip(
                "16F9999".to_string()
            ))
        );
    }

    #[test]
    fn dump_needs_output() {
        let request = OperationRequest::new(OperationKind::Dump, "16F84A", "COM1");
        let result = dispatcher().execute(request);
        assert_eq!(
            result.status,
            OperationStatus::PreconditionFailed(PreconditionError::MissingOutput)
        );
    }

    #[test]
    fn launch_failure_is_backend_not_found_and_frees_port() {
        let dispatcher = dispatcher();
        let result = dispatcher.execute(OperationRequest::erase("16F84A", "COM1"));
        assert_eq!(result.status, OperationStatus::BackendNotFound);
        assert_eq!(result.output.len(), 1);
        assert!(result.hint().is_some());
        assert!(!dispatcher.is_port_busy("COM1"));
    }
}
