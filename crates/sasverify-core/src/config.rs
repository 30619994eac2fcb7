//! Configuration resolution for sasverify.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/sasverify/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default prefix for the info labels fed to the byte expander and MAC.
pub const DEFAULT_INFO_PREFIX: &str = "SASVERIFY_KEY_VERIFICATION";

/// Complete sasverify configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the short authentication string is shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMethod {
    #[default]
    Emoji,
    Decimal,
}

impl fmt::Display for DisplayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emoji => write!(f, "emoji"),
            Self::Decimal => write!(f, "decimal"),
        }
    }
}

impl FromStr for DisplayMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "emoji" => Ok(Self::Emoji),
            "decimal" => Ok(Self::Decimal),
            other => Err(Error::Config(format!(
                "unknown display method '{other}' (expected 'emoji' or 'decimal')"
            ))),
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub method: DisplayMethod,
    /// Print emoji names under the emoji.
    pub emoji_names: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            method: DisplayMethod::Emoji,
            emoji_names: true,
        }
    }
}

/// Protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Prefix both parties use when building info labels.
    pub info_prefix: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            info_prefix: DEFAULT_INFO_PREFIX.to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let global = global_config_path();
    load_layers(global.as_deref(), explicit, |key| std::env::var(key).ok())
}

/// Resolve defaults, the global file (if present), the explicit file and
/// `SASVERIFY_*` overrides read through `lookup`.
///
/// Each file only overrides the keys it sets.
pub fn load_layers<F>(global: Option<&Path>, explicit: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = serde_json::to_value(Config::default())
        .map_err(|e| Error::Config(format!("Failed to encode default config: {e}")))?;

    if let Some(path) = global.filter(|p| p.exists()) {
        tracing::debug!(path = %path.display(), "applying global config");
        merge_json(&mut merged, read_layer(path)?);
    }

    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "applying explicit config");
        merge_json(&mut merged, read_layer(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Failed to parse merged config: {e}")))?;
    apply_env_overrides(&mut config, lookup)?;
    Ok(config)
}

fn read_layer(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Overlay `overlay` onto `base`, recursing into objects.
fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sasverify").join("settings.json"))
}

/// Read one config file. Missing sections fall back to defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    serde_json::from_value(read_layer(path)?).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `SASVERIFY_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SASVERIFY_DISPLAY_METHOD") {
        config.display.method = val.parse()?;
        tracing::debug!(method = %config.display.method, "display method from environment");
    }
    if let Some(val) = lookup("SASVERIFY_INFO_PREFIX") {
        tracing::debug!(prefix = %val, "info prefix from environment");
        config.protocol.info_prefix = val;
    }
    if let Some(val) = lookup("SASVERIFY_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("SASVERIFY_LOG_JSON") {
        config.logging.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
    Ok(())
}
