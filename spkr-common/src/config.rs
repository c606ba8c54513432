//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SPKR_ROOT_FOLDER` environment variable
//! 3. `SPKR_ROOT` environment variable
//! 4. TOML config file (`root_folder` key)
//! 5. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup: the resolver logs a
//! warning and falls through to the next tier.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Primary root folder environment variable
pub const ENV_ROOT_FOLDER: &str = "SPKR_ROOT_FOLDER";

/// Secondary (short form) root folder environment variable
pub const ENV_ROOT: &str = "SPKR_ROOT";

/// Subdirectory holding persisted assignment records
pub const ASSIGNMENTS_DIR: &str = "assignments";

/// Subdirectory holding recording catalog entries
pub const CATALOG_DIR: &str = "catalog";

/// Subdirectory holding cached provider responses
pub const CACHE_DIR: &str = "cache";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Fields shared by every spkr module's TOML file
///
/// Module-specific sections live alongside these keys in the same file and
/// are read by the module itself via [`load_toml_file`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled platform defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/spkr
        dirs::data_local_dir()
            .map(|d| d.join("spkr"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/spkr"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/spkr
        dirs::data_dir()
            .map(|d| d.join("spkr"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/spkr"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\spkr
        dirs::data_local_dir()
            .map(|d| d.join("spkr"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\spkr"))
    } else {
        PathBuf::from("./spkr_data")
    }
}

/// Resolves the root folder for a module
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    /// Create resolver for a module (e.g. "spkr-assign")
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an explicit TOML config file instead of the per-user default
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Path of the TOML config file consulted by [`Self::resolve`]
    ///
    /// `~/.config/spkr/<module>.toml` unless overridden.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        dirs::config_dir().map(|d| d.join("spkr").join(format!("{}.toml", self.module_name)))
    }

    /// Resolve root folder (never fails; falls back to compiled default)
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(root = %path.display(), "Root folder from command line");
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    debug!(root = %value, env = var, "Root folder from environment");
                    return PathBuf::from(value);
                }
            }
        }

        if let Some(config_path) = self.config_path() {
            match load_toml_file::<TomlConfig>(&config_path) {
                Ok(config) => {
                    if let Some(root) = config.root_folder {
                        debug!(root = %root.display(), "Root folder from TOML config");
                        return root;
                    }
                }
                Err(e) => {
                    warn!(
                        config = %config_path.display(),
                        error = %e,
                        "Ignoring unreadable TOML config; using defaults"
                    );
                }
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create root folder and its standard subdirectories (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        for dir in [
            self.root_folder.clone(),
            self.assignments_dir(),
            self.catalog_dir(),
            self.cache_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    pub fn assignments_dir(&self) -> PathBuf {
        self.root_folder.join(ASSIGNMENTS_DIR)
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.root_folder.join(CATALOG_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root_folder.join(CACHE_DIR)
    }
}

/// Load a TOML file into `T`
///
/// A missing file yields `T::default()`; a file that exists but does not
/// parse is a configuration error.
pub fn load_toml_file<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        debug!(config = %path.display(), "TOML config not found; using defaults");
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config atomically (temp file + rename)
///
/// On Unix the file is created with 0600 permissions.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}
