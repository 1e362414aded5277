//! Application configuration for InviteBoard.
//!
//! User config lives at `~/.inviteboard/inviteboard.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{InviteBoardError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "inviteboard.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".inviteboard";

// ---------------------------------------------------------------------------
// Config structs (matching inviteboard.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// How reports are delivered by email.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Report defaults.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file. `~` is expanded.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.inviteboard/inviteboard.db".into()
}

/// Which delivery gateway `send` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Write messages to the outbox directory.
    #[default]
    Outbox,
    /// POST messages to an HTTP mail relay.
    Relay,
}

/// `[delivery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub mode: DeliveryMode,

    /// Relay endpoint; required when `mode = "relay"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    /// Name of the env var holding the relay token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Sender address.
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Per-request timeout for the relay transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory the outbox gateway writes to. `~` is expanded.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            relay_url: None,
            token_env: default_token_env(),
            sender: default_sender(),
            timeout_secs: default_timeout_secs(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

fn default_token_env() -> String {
    "INVITEBOARD_RELAY_TOKEN".into()
}
fn default_sender() -> String {
    "reports@localhost".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_outbox_dir() -> String {
    "~/.inviteboard/outbox".into()
}

impl DeliveryConfig {
    /// Parsed relay URL, or a config error if relay mode lacks one.
    pub fn relay_endpoint(&self) -> Result<Url> {
        let raw = self.relay_url.as_deref().ok_or_else(|| {
            InviteBoardError::config("delivery.mode is \"relay\" but delivery.relay_url is not set")
        })?;
        Url::parse(raw)
            .map_err(|e| InviteBoardError::config(format!("invalid delivery.relay_url '{raw}': {e}")))
    }

    /// Relay bearer token from the configured env var, if set and non-empty.
    pub fn relay_token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|v| !v.is_empty())
    }
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Subject line used by `send` when none is given.
    #[serde(default = "default_subject")]
    pub default_subject: String,

    /// Body text used by `send` when none is given.
    #[serde(default = "default_body")]
    pub default_body: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_subject: default_subject(),
            default_body: default_body(),
        }
    }
}

fn default_subject() -> String {
    "User Data Report".into()
}
fn default_body() -> String {
    "Please find the attached user data report.".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.inviteboard/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InviteBoardError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.inviteboard/inviteboard.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| InviteBoardError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        InviteBoardError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InviteBoardError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InviteBoardError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InviteBoardError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
