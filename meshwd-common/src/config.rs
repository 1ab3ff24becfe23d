//! Configuration file loading and path resolution
//!
//! Resolution priority for the TOML file location:
//! 1. Explicit path (command-line argument)
//! 2. `MESHWD_CONFIG` environment variable
//! 3. `<config_dir>/meshwd/meshwd.toml` (OS-dependent, via `dirs`)
//!
//! A missing file is not an error: the caller gets `TomlConfig::default()`
//! and a warning is logged. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MESHWD_CONFIG";

/// Contact appended to the User-Agent when none is configured
const DEFAULT_CONTACT: &str = "https://www.wikidata.org/wiki/User:meshwd";

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. "info", "debug")
    pub level: Option<String>,
    /// Optional log file, written in addition to stderr
    pub file: Option<PathBuf>,
}

/// `[reconcile]` section of the TOML file
///
/// Every field is optional; unset fields fall back to compiled defaults in
/// the reconcile crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSection {
    pub threshold: Option<f64>,
    pub search_limit: Option<u32>,
    pub language: Option<String>,
    pub api_endpoint: Option<String>,
    pub sparql_endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub requests_per_second: Option<u32>,
    pub sparql_requests_per_second: Option<u32>,
    pub sparql_max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub max_consecutive_failures: Option<usize>,
}

/// Contents of `meshwd.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Contact URL or email for the Wikimedia User-Agent policy
    pub contact: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reconcile: ReconcileSection,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Default config file location for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("meshwd").join("meshwd.toml"))
}

/// Resolve which config file to read
///
/// Returns `None` only when no explicit path was given and the platform has
/// no config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// Path resolved but nothing there; defaults used
    Missing(PathBuf),
    /// No explicit path and no platform config directory; defaults used
    NoConfigDir,
}

impl ConfigSource {
    pub fn detect(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => ConfigSource::File(path.to_path_buf()),
            Some(path) => ConfigSource::Missing(path.to_path_buf()),
            None => ConfigSource::NoConfigDir,
        }
    }

    pub fn uses_defaults(&self) -> bool {
        !matches!(self, ConfigSource::File(_))
    }

    /// Report the source; call once the subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!(path = %path.display(), "Loaded config file"),
            ConfigSource::Missing(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
            ConfigSource::NoConfigDir => {
                warn!("No configuration directory available, using defaults")
            }
        }
    }
}

/// Load the TOML config, degrading to defaults when the file is absent
///
/// Runs before logging is set up, so it does not report where the values came
/// from; see [`ConfigSource::log`].
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match ConfigSource::detect(path) {
        ConfigSource::File(path) => path,
        _ => return Ok(TomlConfig::default()),
    };

    let content = std::fs::read_to_string(&path)?;
    TomlConfig::from_toml_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// User-Agent string for all outgoing requests
///
/// Wikimedia requires a descriptive agent with contact information.
pub fn get_user_agent(contact: Option<&str>) -> String {
    let contact = contact
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CONTACT);

    format!(
        "meshwd/{} ({}) reqwest",
        env!("CARGO_PKG_VERSION"),
        contact
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::from_toml_str(
            r#"
            contact = "mailto:curator@example.org"

            [logging]
            level = "debug"
            file = "run.log"

            [reconcile]
            threshold = 85.0
            search_limit = 7
            language = "de"
            concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.contact.as_deref(), Some("mailto:curator@example.org"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.file, Some(PathBuf::from("run.log")));
        assert_eq!(config.reconcile.threshold, Some(85.0));
        assert_eq!(config.reconcile.search_limit, Some(7));
        assert_eq!(config.reconcile.language.as_deref(), Some("de"));
        assert_eq!(config.reconcile.concurrency, Some(4));
        assert_eq!(config.reconcile.sparql_endpoint, None);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_malformed_config_is_error() {
        let result = TomlConfig::from_toml_str("[reconcile]\nthreshold = \"high\"");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_user_agent_contains_contact() {
        let ua = get_user_agent(Some("mailto:someone@example.org"));
        assert!(ua.starts_with("meshwd/"));
        assert!(ua.contains("mailto:someone@example.org"));
    }

    #[test]
    fn test_user_agent_blank_contact_uses_default() {
        let ua = get_user_agent(Some("   "));
        assert!(ua.contains(DEFAULT_CONTACT));
    }
}
