//! Configuration loading and root folder resolution
//!
//! Resolution order for every NeuroShield binary:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops a binary from starting: it
//! logs a warning and continues with defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "NS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "neuroshield.db";

/// Logging configuration shared by all binaries
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: get_default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Resolves the root folder for one binary
///
/// `module_name` selects the TOML file (`<config dir>/neuroshield/<module_name>.toml`).
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve without a command-line override
    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(None)
    }

    /// Resolve, letting `cli_arg` win over every other source
    pub fn resolve_with(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(config_path) = self.config_file_path() {
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                if let Ok(value) = toml::from_str::<toml::Value>(&content) {
                    if let Some(root) = value.get("root_folder").and_then(|v| v.as_str()) {
                        return PathBuf::from(root);
                    }
                }
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }

    /// Default TOML path for this module, if the platform has a config dir
    pub fn config_file_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join("neuroshield")
                .join(format!("{}.toml", self.module_name))
        })
    }
}

/// Creates the root folder and hands out paths inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}

/// Load a TOML config file, falling back to defaults
///
/// Returns the parsed config and a warning describing why defaults were used,
/// if they were. The caller logs the warning once tracing is up.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> (T, Option<String>)
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return (T::default(), Some("No config file path available, using defaults".to_string()));
    };

    match load_toml(path) {
        Ok(config) => (config, None),
        Err(e) => (
            T::default(),
            Some(format!("{} - using defaults", e)),
        ),
    }
}

/// Load and parse a TOML config file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))
}

/// Log a config warning produced before tracing was initialized
pub fn report_config_warning(warning: Option<String>) {
    if let Some(warning) = warning {
        warn!("{}", warning);
    }
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("neuroshield"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/neuroshield"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("neuroshield"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/neuroshield"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("neuroshield"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\neuroshield"))
    } else {
        PathBuf::from("./neuroshield_data")
    }
}
