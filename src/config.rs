//! Persistent user settings
//!
//! Settings live in a pretty-printed JSON file under the platform config
//! directory (`~/.config/picman/config.json` on Linux). Keys missing from the
//! file take their default value, and a file that cannot be read or parsed is
//! replaced by defaults with a warning rather than stopping the program.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Backend, BackendSearch, BackendSelection};
use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CHIP, DEFAULT_MAX_RECENT_FILES,
    DEFAULT_PROGRAMMER_TIMEOUT_SECS,
};
use crate::dispatcher::{Dispatcher, OperationKind, OperationRequest};
use crate::error::{PicError, PicResult};
use crate::i18n::{Language, Message, translate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_port: Option<String>,
    pub last_chip: String,
    pub last_hex_file: Option<PathBuf>,
    pub last_output_dir: Option<PathBuf>,
    pub icsp_enabled: bool,
    pub window_geometry: String,
    pub language: Language,
    pub auto_detect_programmer: bool,
    pub programmer_timeout_secs: u64,

    /// Most recent first
    pub recent_files: Vec<PathBuf>,
    pub max_recent_files: usize,

    pub backend: BackendSelection,
    pub backend_path: Option<PathBuf>,
    pub auto_find_backend: bool,
    pub backend_search_paths: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_port: None,
            last_chip: DEFAULT_CHIP.to_string(),
            last_hex_file: None,
            last_output_dir: None,
            icsp_enabled: false,
            window_geometry: "800x600".to_string(),
            language: Language::default(),
            auto_detect_programmer: true,
            programmer_timeout_secs: DEFAULT_PROGRAMMER_TIMEOUT_SECS,
            recent_files: Vec::new(),
            max_recent_files: DEFAULT_MAX_RECENT_FILES,
            backend: BackendSelection::default(),
            backend_path: None,
            auto_find_backend: true,
            backend_search_paths: vec![
                "/usr/local/bin".to_string(),
                "/usr/bin".to_string(),
                "~/.local/bin".to_string(),
            ],
        }
    }
}

/// `config.json` inside the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl Settings {
    /// Load settings from `path`; a missing file gives the defaults
    pub fn load(path: impl AsRef<Path>) -> PicResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PicError::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PicError::Configuration(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> PicResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PicError::Configuration(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            PicError::Configuration(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Move `path` to the front of the recent files list
    pub fn add_recent_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.recent_files.retain(|p| *p != path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(self.max_recent_files);
    }

    /// Recent files that still exist. Vanished files are dropped from the list.
    pub fn recent_files(&mut self) -> &[PathBuf] {
        self.recent_files.retain(|p| p.exists());
        &self.recent_files
    }

    pub fn backend_search(&self) -> BackendSearch {
        BackendSearch {
            selection: self.backend,
            configured_path: self.backend_path.clone(),
            auto_find: self.auto_find_backend,
            extra_dirs: self.backend_search_paths.clone(),
        }
    }
}

/// Settings together with where they came from
#[derive(Debug, Clone)]
pub struct Context {
    settings: Settings,
    path: Option<PathBuf>,
}

impl Context {
    /// Settings from the default location, or defaults if there is none
    pub fn load() -> Self {
        match default_config_path() {
            Some(path) => Self::load_from(path),
            None => {
                warn!("Could not determine config directory, settings will not be saved");
                Self::in_memory(Settings::default())
            }
        }
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!("Loading settings from {}", path.display());
        Self {
            settings: Settings::load_or_default(&path),
            path: Some(path),
        }
    }

    /// Settings that are never written to disk
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn language(&self) -> Language {
        self.settings.language
    }

    pub fn tr(&self, message: Message) -> &'static str {
        translate(self.settings.language, message)
    }

    /// Re-read the settings file, replacing unsaved changes
    pub fn reload(&mut self) -> PicResult<()> {
        if let Some(path) = &self.path {
            self.settings = Settings::load(path)?;
        }
        Ok(())
    }

    pub fn save(&self) -> PicResult<()> {
        match &self.path {
            Some(path) => self.settings.save(path),
            None => Ok(()),
        }
    }

    pub fn resolve_backend(&self) -> Option<Backend> {
        self.settings.backend_search().resolve()
    }

    /// Timeout for short backend checks
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.programmer_timeout_secs)
    }

    /// Dispatcher for the resolved backend. When nothing resolves the bare
    /// executable name is used, so the run ends as `BackendNotFound`.
    pub fn dispatcher(&self) -> Dispatcher {
        let program = match self.resolve_backend() {
            Some(backend) => backend.path,
            None => PathBuf::from(self.settings.backend.default_executable()),
        };
        Dispatcher::new(program)
    }

    /// Remember the choices of a request for the next run
    pub fn remember(&mut self, request: &OperationRequest) {
        let settings = &mut self.settings;
        settings.last_port = Some(request.port.clone());
        settings.last_chip = request.chip.clone();
        settings.icsp_enabled = request.icsp;

        match (request.kind, &request.file) {
            (OperationKind::Program | OperationKind::Verify, Some(file)) => {
                settings.last_hex_file = Some(file.clone());
                settings.add_recent_file(file);
            }
            (OperationKind::Dump, Some(file)) => {
                settings.last_output_dir = file
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(Path::to_path_buf);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "last_chip": "16F84A", "language": "de" }"#).unwrap();
        assert_eq!(settings.last_chip, "16F84A");
        assert_eq!(settings.language, Language::German);
        assert_eq!(settings.max_recent_files, DEFAULT_MAX_RECENT_FILES);
        assert_eq!(settings.backend, BackendSelection::Picpro);
        assert!(settings.auto_find_backend);
    }

    #[test]
    fn recent_files_are_deduplicated_and_capped() {
        let mut settings = Settings {
            max_recent_files: 3,
            ..Settings::default()
        };
        for name in ["a.hex", "b.hex", "c.hex", "a.hex", "d.hex"] {
            settings.add_recent_file(name);
        }
        assert_eq!(
            settings.recent_files,
            vec![
                PathBuf::from("d.hex"),
                PathBuf::from("a.hex"),
                PathBuf::from("c.hex")
            ]
        );
    }

    #[test]
    fn remember_tracks_last_choices() {
        let mut context = Context::in_memory(Settings::default());
        let request = OperationRequest::program("16F628A", "/dev/ttyUSB0", "blink.hex").with_icsp(true);
        context.remember(&request);

        let settings = context.settings();
        assert_eq!(settings.last_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(settings.last_chip, "16F628A");
        assert!(settings.icsp_enabled);
        assert_eq!(settings.last_hex_file, Some(PathBuf::from("blink.hex")));
        assert_eq!(settings.recent_files.first(), Some(&PathBuf::from("blink.hex")));
    }

    #[test]
    fn in_memory_context_saves_nothing() {
        let context = Context::in_memory(Settings::default());
        assert!(context.path().is_none());
        assert!(context.save().is_ok());
        assert_eq!(context.tr(Message::Ready), "Ready");
    }
}
