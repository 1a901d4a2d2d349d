//! Application configuration for Articulate.
//!
//! User config lives at `~/.articulate/articulate.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArticulateError, Result};
use crate::types::DedupPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "articulate.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".articulate";

// ---------------------------------------------------------------------------
// Config structs (matching articulate.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transfer API settings.
    #[serde(default)]
    pub assist: AssistConfig,

    /// Global defaults for pipeline runs.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// `[assist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    /// API root, e.g. `https://assist.org/api`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AssistConfig {
    /// Parse and validate the configured API root.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ArticulateError::config(format!("invalid assist.base_url '{}': {e}", self.base_url))
        })?;
        if url.cannot_be_a_base() {
            return Err(ArticulateError::config(format!(
                "assist.base_url '{}' cannot be used as a base URL",
                self.base_url
            )));
        }
        Ok(url)
    }
}

fn default_base_url() -> String {
    "https://assist.org/api".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Department directory file (receiving institution, year, departments).
    #[serde(default = "default_directory_path")]
    pub directory_path: String,

    /// Where the final equivalence map is written.
    #[serde(default = "default_output_path")]
    pub output_path: String,

    /// Departments queried concurrently. `1` runs strictly sequentially.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// How repeated equivalences are folded into the map.
    #[serde(default)]
    pub dedup: DedupPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            directory_path: default_directory_path(),
            output_path: default_output_path(),
            concurrency: default_concurrency(),
            dedup: DedupPolicy::default(),
        }
    }
}

fn default_directory_path() -> String {
    "assist-data.json".into()
}
fn default_output_path() -> String {
    "transfers.json".into()
}
fn default_concurrency() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum departments in flight at once (at least 1).
    pub concurrency: usize,
    /// Dedup policy for the equivalence map.
    pub dedup: DedupPolicy,
    /// Restrict the run to these department codes. Empty means all.
    pub departments: Vec<String>,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: (config.defaults.concurrency as usize).max(1),
            dedup: config.defaults.dedup,
            departments: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.articulate/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArticulateError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.articulate/articulate.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ArticulateError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArticulateError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArticulateError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArticulateError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArticulateError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
