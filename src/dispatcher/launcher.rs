use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, trace};

use super::operation::OutputLine;

/// How a backend process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when ended by a signal
    pub code: Option<i32>,
}

/// A running backend process
pub trait BackendProcess: Send {
    /// Combined stdout/stderr lines. The channel disconnects once both
    /// streams are closed. Can be taken once.
    fn take_output(&mut self) -> Option<Receiver<OutputLine>>;

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>>;

    fn wait(&mut self) -> io::Result<ProcessExit>;

    fn kill(&mut self) -> io::Result<()>;
}

/// Starts backend processes. The seam tests use to replace real spawning.
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn BackendProcess>>;
}

/// Spawns real child processes with piped output
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn BackendProcess>> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        debug!("Spawned {} (pid {})", program.display(), child.id());

        let (tx, rx) = unbounded();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone(), OutputLine::stdout)?;
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx, OutputLine::stderr)?;
        }

        Ok(Box::new(ChildProcess {
            child,
            output: Some(rx),
        }))
    }
}

fn forward_lines<R>(stream: R, tx: Sender<OutputLine>, wrap: fn(String) -> OutputLine) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("backend output".to_string())
        .spawn(move || {
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) => {
                        trace!("backend: {}", line);
                        if tx.send(wrap(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("Stopped reading backend output: {}", e);
                        break;
                    }
                }
            }
        })?;
    Ok(())
}

struct ChildProcess {
    child: Child,
    output: Option<Receiver<OutputLine>>,
}

impl BackendProcess for ChildProcess {
    fn take_output(&mut self) -> Option<Receiver<OutputLine>> {
        self.output.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ProcessExit { code: status.code() }))
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait()?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }

    fn kill(&mut self) -> io::Result<()> {
        match self.child.kill() {
            // Already exited
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}
