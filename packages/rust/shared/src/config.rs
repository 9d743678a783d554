//! Application configuration for propcrawl.
//!
//! User config lives at `~/.propcrawl/propcrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "propcrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".propcrawl";

// ---------------------------------------------------------------------------
// Config structs (matching propcrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Browser driver settings.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Workflow policy.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Where results and presets are written.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[driver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Run the browser without a window.
    #[serde(default)]
    pub headless: bool,

    /// Upper bound for any single element/content wait.
    #[serde(default = "default_element_timeout")]
    pub element_timeout_ms: u64,

    /// Polling cadence inside a wait.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: false,
            element_timeout_ms: default_element_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_element_timeout() -> u64 {
    5000
}
fn default_poll_interval() -> u64 {
    100
}

/// `[workflow]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Crawl a lone building immediately instead of waiting for a choice.
    #[serde(default = "default_true")]
    pub auto_select_single_building: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_select_single_building: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for `results/` and `presets/`. A leading `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "~/.propcrawl/data".into()
}

impl StorageConfig {
    /// Resolve `data_dir` to an absolute path, expanding `~`.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match self.data_dir.strip_prefix('~') {
            Some(rest) => {
                let home = dirs::home_dir()
                    .ok_or_else(|| CrawlError::config("could not determine home directory"))?;
                Ok(home.join(rest.trim_start_matches(['/', '\\'])))
            }
            None => Ok(PathBuf::from(&self.data_dir)),
        }
    }
}

// ---------------------------------------------------------------------------
// Wait budget (runtime, derived from [driver])
// ---------------------------------------------------------------------------

/// Bounded wait applied by drivers to every element/content wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudget {
    /// Give up after this long.
    pub timeout: Duration,
    /// Re-check the condition this often.
    pub poll_interval: Duration,
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::from(&DriverConfig::default())
    }
}

impl From<&DriverConfig> for WaitBudget {
    fn from(config: &DriverConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.element_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }
}

impl From<&AppConfig> for WaitBudget {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.driver)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.propcrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.propcrawl/propcrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CrawlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CrawlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
