#![allow(dead_code)]

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use picman::dispatcher::{BackendProcess, Launcher, OutputLine, ProcessExit};
use tempfile::NamedTempFile;

/// A launcher that never spawns anything. Every launch is counted and
/// produces a process following the same script.
pub struct MockLauncher {
    lines: Vec<OutputLine>,
    exit_code: i32,
    hang: bool,
    lost: bool,
    launches: AtomicUsize,
    args: Mutex<Vec<Vec<String>>>,
    kills: Arc<AtomicUsize>,
    reaps: Arc<AtomicUsize>,
}

impl MockLauncher {
    /// Process that prints `lines` and exits with `exit_code`
    pub fn exiting(exit_code: i32, lines: Vec<OutputLine>) -> Self {
        Self {
            lines,
            exit_code,
            hang: false,
            lost: false,
            launches: AtomicUsize::new(0),
            args: Mutex::new(Vec::new()),
            kills: Arc::new(AtomicUsize::new(0)),
            reaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Process that prints `lines` and then runs until killed
    pub fn hanging(lines: Vec<OutputLine>) -> Self {
        Self {
            hang: true,
            ..Self::exiting(0, lines)
        }
    }

    /// Process whose status can no longer be queried
    pub fn lost(lines: Vec<OutputLine>) -> Self {
        Self {
            lost: true,
            ..Self::exiting(0, lines)
        }
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn reaps(&self) -> usize {
        self.reaps.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Option<Vec<String>> {
        self.args.lock().unwrap().last().cloned()
    }
}

impl Launcher for MockLauncher {
    fn launch(&self, _program: &Path, args: &[String]) -> io::Result<Box<dyn BackendProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.args.lock().unwrap().push(args.to_vec());

        let (tx, rx) = unbounded();
        for line in &self.lines {
            tx.send(line.clone()).unwrap();
        }

        Ok(Box::new(MockProcess {
            output: Some(rx),
            // Keeping the sender open means the output never disconnects,
            // like a real process that is still running
            open_output: self.hang.then_some(tx),
            exit_code: self.exit_code,
            hang: self.hang,
            lost: self.lost,
            killed: false,
            kills: self.kills.clone(),
            reaps: self.reaps.clone(),
        }))
    }
}

struct MockProcess {
    output: Option<Receiver<OutputLine>>,
    open_output: Option<Sender<OutputLine>>,
    exit_code: i32,
    hang: bool,
    lost: bool,
    killed: bool,
    kills: Arc<AtomicUsize>,
    reaps: Arc<AtomicUsize>,
}

impl MockProcess {
    fn exit(&self) -> ProcessExit {
        if self.killed {
            ProcessExit { code: None }
        } else {
            ProcessExit {
                code: Some(self.exit_code),
            }
        }
    }
}

impl BackendProcess for MockProcess {
    fn take_output(&mut self) -> Option<Receiver<OutputLine>> {
        self.output.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        if self.lost {
            return Err(io::Error::other("no child process"));
        }
        if self.hang && !self.killed {
            Ok(None)
        } else {
            Ok(Some(self.exit()))
        }
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        self.reaps.fetch_add(1, Ordering::SeqCst);
        if self.hang && !self.killed {
            return Err(io::Error::other("would block forever"));
        }
        Ok(self.exit())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.killed = true;
        self.open_output.take();
        Ok(())
    }
}

/// Small valid HEX image on disk
pub fn hex_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, ":080000008316860183128601BC").unwrap();
    writeln!(file, ":00000001FF").unwrap();
    file
}
