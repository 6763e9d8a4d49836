//! Locating and checking the external programming backend

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chips::ChipDescriptor;
use crate::constants::{BACKEND_QUERY_TIMEOUT_SECS, WORKER_POLL_INTERVAL_MS};
use crate::error::{PicError, PicResult};

/// Which backend the user asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSelection {
    #[default]
    Picpro,
    Picp,
    /// Prefer picp, fall back to picpro
    Auto,
}

impl BackendSelection {
    fn candidates(&self) -> &'static [BackendKind] {
        match self {
            BackendSelection::Picpro => &[BackendKind::Picpro],
            BackendSelection::Picp => &[BackendKind::Picp],
            BackendSelection::Auto => &[BackendKind::Picp, BackendKind::Picpro],
        }
    }

    /// Executable name to fall back on when nothing was found
    pub fn default_executable(&self) -> &'static str {
        self.candidates()[0].executable_name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Picpro,
    Picp,
}

impl BackendKind {
    pub fn executable_name(&self) -> &'static str {
        match self {
            BackendKind::Picpro => "picpro",
            BackendKind::Picp => "picp",
        }
    }

    pub fn minimum_version(&self) -> Version {
        match self {
            BackendKind::Picpro => Version::new(0, 3, 0),
            BackendKind::Picp => Version::new(1, 0, 0),
        }
    }

    fn from_path(path: &Path) -> BackendKind {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if stem == "picp" {
            BackendKind::Picp
        } else {
            BackendKind::Picpro
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:version\s+)?\bv?(\d+)\.(\d+)\.(\d+)").expect("version pattern is valid")
});

/// Find the first `x.y.z` version in backend output, e.g. `picpro 0.3.1`,
/// `v1.2.0` or `version 0.4.0`
pub fn parse_version(text: &str) -> Option<Version> {
    let captures = VERSION_RE.captures(text)?;
    let part = |i: usize| captures.get(i)?.as_str().parse::<u32>().ok();
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// A resolved backend executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub kind: BackendKind,
    pub path: PathBuf,
}

/// Where to look for the backend
#[derive(Debug, Clone, Default)]
pub struct BackendSearch {
    pub selection: BackendSelection,

    /// Explicit path set by the user; wins when it exists
    pub configured_path: Option<PathBuf>,

    /// Search `PATH` and `extra_dirs` when no explicit path works
    pub auto_find: bool,

    /// Additional directories, `~` is expanded
    pub extra_dirs: Vec<String>,
}

impl BackendSearch {
    pub fn resolve(&self) -> Option<Backend> {
        if let Some(path) = self.configured_path.as_ref().filter(|p| is_executable(p)) {
            let kind = match self.selection {
                BackendSelection::Picpro => BackendKind::Picpro,
                BackendSelection::Picp => BackendKind::Picp,
                BackendSelection::Auto => BackendKind::from_path(path),
            };
            debug!("Using configured backend {}", path.display());
            return Some(Backend {
                kind,
                path: path.clone(),
            });
        }

        if !self.auto_find {
            return None;
        }

        for kind in self.selection.candidates() {
            let name = kind.executable_name();
            let found = find_in_path(name).or_else(|| {
                self.extra_dirs
                    .iter()
                    .map(|dir| expand_home(dir).join(executable_file_name(name)))
                    .find(|path| is_executable(path))
            });
            if let Some(path) = found {
                info!("Found {} backend at {}", kind, path.display());
                return Some(Backend { kind: *kind, path });
            }
        }
        None
    }
}

fn executable_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs_next::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    let file_name = executable_file_name(name);
    std::env::split_paths(&paths)
        .map(|dir| dir.join(&file_name))
        .find(|path| is_executable(path))
}

pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Output of a short backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

fn read_all<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut stream) = stream {
            if let Err(e) = stream.read_to_string(&mut text) {
                debug!("Could not read backend output: {}", e);
            }
        }
        text
    })
}

/// Run the backend with `args`, killing it if it outlives `timeout`
pub fn run_captured(program: &Path, args: &[&str], timeout: Duration) -> PicResult<CapturedOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            PicError::Backend(format!("Could not run {}: {}", program.display(), e))
        })?;

    let stdout = read_all(child.stdout.take());
    let stderr = read_all(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PicError::Backend(format!(
                "{} {} timed out",
                program.display(),
                args.join(" ")
            )));
        }
        thread::sleep(Duration::from_millis(WORKER_POLL_INTERVAL_MS));
    };

    Ok(CapturedOutput {
        exit_code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Outcome of checking a backend executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCheck {
    pub version: Option<Version>,
    pub compatible: bool,
    pub message: String,
}

impl Backend {
    /// Check the executable exists, runs and is recent enough
    pub fn validate(&self, timeout: Duration) -> PicResult<BackendCheck> {
        if !self.path.exists() {
            return Err(PicError::Backend("Path does not exist".to_string()));
        }
        if !is_executable(&self.path) {
            return Err(PicError::Backend("File is not executable".to_string()));
        }

        let mut version = None;
        for flag in ["--version", "--help"] {
            let output = run_captured(&self.path, &[flag], timeout)?;
            if output.success() {
                version = parse_version(&output.stdout).or_else(|| parse_version(&output.stderr));
                if version.is_some() {
                    break;
                }
            }
        }

        let minimum = self.kind.minimum_version();
        let check = match version {
            Some(version) if version >= minimum => BackendCheck {
                version: Some(version),
                compatible: true,
                message: format!("Version {} (OK)", version),
            },
            Some(version) => BackendCheck {
                version: Some(version),
                compatible: false,
                message: format!("version {} is too old (minimum: {})", version, minimum),
            },
            None => {
                warn!("Could not determine {} version", self.kind);
                BackendCheck {
                    version: None,
                    compatible: true,
                    message: "version unknown (assuming compatible)".to_string(),
                }
            }
        };
        Ok(check)
    }

    /// Chip details as reported by the backend, pretty-printed when the
    /// backend answers with JSON
    pub fn chip_info(&self, chip: &ChipDescriptor) -> PicResult<String> {
        let output = self.query(&["chipinfo", chip.part_number])?;
        Ok(match serde_json::from_str::<serde_json::Value>(&output) {
            Ok(value) => serde_json::to_string_pretty(&value)?,
            Err(_) => output,
        })
    }

    pub fn hex_info(&self, file: &Path, chip: &ChipDescriptor) -> PicResult<String> {
        let file = file.to_string_lossy().into_owned();
        self.query(&["hexinfo", file.as_str(), chip.part_number])
    }

    fn query(&self, args: &[&str]) -> PicResult<String> {
        let output = run_captured(
            &self.path,
            args,
            Duration::from_secs(BACKEND_QUERY_TIMEOUT_SECS),
        )?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(PicError::Backend(output.stderr.trim().to_string()))
        }
    }
}
