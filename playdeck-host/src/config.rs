//! Host configuration.
//!
//! Read from `$XDG_CONFIG_HOME/playdeck/config.toml`; a commented default is
//! written there on first run.
//!
//! Besides host options the file carries setting overrides. They are written
//! into the settings store once every plugin has registered its schema, so
//! they go through the same validation as any other stored value.

use anyhow::{Context, Result};
use playdeck_plugin_api::SettingsStore;
use playdeck_runtime::SettingValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Smallest read buffer: one quad frame of `f32` samples.
pub const MIN_BUFFER_BYTES: usize = 16;

/// Setting overrides: owner -> extension (or `*`) -> setting id -> value.
pub type SettingOverrides = BTreeMap<String, BTreeMap<String, toml::Table>>;

/// Main host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Host-specific configuration
    pub host: HostConfig,
    /// Setting overrides seeded into the settings store
    #[serde(default)]
    pub settings: SettingOverrides,
}

/// Host playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
    /// Output rate used when a plugin has no sample rate configured
    /// Default: 48000
    pub native_sample_rate: u32,
    /// Size of the buffer handed to each read call
    /// Default: 4096
    pub buffer_bytes: usize,
    /// First prefix length offered to probe
    /// Default: 2048
    pub probe_bytes: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            native_sample_rate: 48000,
            buffer_bytes: 4096,
            probe_bytes: playdeck_plugin_api::registry::INITIAL_PROBE_BYTES,
        }
    }
}

impl Config {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from [`Config::default_config_path`], writing the default file first
    /// if there is none.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// `$XDG_CONFIG_HOME/playdeck/config.toml` or the platform equivalent.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "raibid-labs", "playdeck")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Write the commented default configuration to `path`.
    pub fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Commented TOML matching [`Config::default`].
    pub fn default_config_content() -> String {
        r#"# Playdeck Host Configuration
# This file configures the playdeck-host behavior.

[host]
# Log level: trace, debug, info, warn, error
# RUST_LOG takes precedence when set.
# Default: "info"
log_level = "info"

# Output rate used when a plugin is left on its default sample rate
# Default: 48000
native_sample_rate = 48000

# Bytes handed to each read call
# Default: 4096
buffer_bytes = 4096

# First prefix length offered to a plugin's probe; doubled on NeedMoreData
# Default: 2048
probe_bytes = 2048

# Setting overrides
# Tables are keyed by plugin, then by file extension. Use "*" for values
# that apply to every extension; an extension table wins over "*".
# Ids and value types must match the plugin's settings schema
# (see `playdeck-host schema`).

# [settings.tracker."*"]
# StereoSeparation = 100
# MasterGain = 0.0

# [settings.tracker.mod]
# AmigaModResampling = true
# AmigaModResamplerFilter = "a500"
"#
        .to_string()
    }

    /// Check host options. Setting overrides are checked by the store when seeded.
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.host.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.host.log_level,
                valid_log_levels.join(", ")
            );
        }

        if !(1000..=384_000).contains(&self.host.native_sample_rate) {
            anyhow::bail!(
                "host.native_sample_rate must be between 1000 and 384000, got {}",
                self.host.native_sample_rate
            );
        }

        if self.host.buffer_bytes < MIN_BUFFER_BYTES {
            anyhow::bail!("host.buffer_bytes must be at least {}", MIN_BUFFER_BYTES);
        }

        if self.host.probe_bytes == 0 {
            anyhow::bail!("host.probe_bytes must be greater than 0");
        }

        for (owner, extensions) in &self.settings {
            if extensions.keys().any(|ext| ext.trim().is_empty()) {
                anyhow::bail!("settings.{}: extension keys must not be empty", owner);
            }
        }

        Ok(())
    }

    /// Write every override into `store`, returning how many were accepted.
    ///
    /// Overrides the store refuses (unknown owner or id, wrong type) are
    /// logged and skipped.
    pub fn seed_store(&self, store: &SettingsStore) -> usize {
        let mut accepted = 0;

        for (owner, extensions) in &self.settings {
            for (ext, values) in extensions {
                for (id, raw) in values {
                    let Some(value) = setting_value(raw) else {
                        warn!(
                            owner = %owner,
                            ext = %ext,
                            id = %id,
                            "Unsupported value type in config"
                        );
                        continue;
                    };

                    match store.set(owner, ext, id, value) {
                        Ok(()) => {
                            debug!(owner = %owner, ext = %ext, id = %id, "Seeded setting");
                            accepted += 1;
                        }
                        Err(e) => {
                            warn!(owner = %owner, ext = %ext, id = %id, "Ignoring setting: {}", e)
                        }
                    }
                }
            }
        }

        accepted
    }
}

/// Convert a TOML scalar into a store value.
pub fn setting_value(value: &toml::Value) -> Option<SettingValue> {
    match value {
        toml::Value::Boolean(b) => Some(SettingValue::Bool(*b)),
        toml::Value::Integer(i) => i32::try_from(*i).ok().map(SettingValue::Int),
        toml::Value::Float(f) => Some(SettingValue::Float(*f as f32)),
        toml::Value::String(s) => Some(SettingValue::String(s.clone())),
        _ => None,
    }
}
