// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::core::DEFAULT_TOLERANCE;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub startup: StartupConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupConfig {
    /// Directory scanned when `run` is invoked without a path
    #[serde(default)]
    pub default_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Video encoder handed to ffmpeg's -c:v
    #[serde(default = "default_encoder")]
    pub encoder: String,

    /// Output container extension
    #[serde(default = "default_container")]
    pub container: String,

    /// Marker inserted before the container extension of derived outputs
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Acceptance band around the target bitrate, as a fraction
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Fixed target in Mbps; unset means the height tier table decides
    #[serde(default)]
    pub target_mbps: Option<f64>,

    /// Whether to overwrite existing output files
    #[serde(default)]
    pub overwrite: bool,

    /// Extra ffmpeg arguments appended to every encode, shell-quoted
    #[serde(default)]
    pub extra_encode_args: String,
}

fn default_encoder() -> String {
    "hevc_videotoolbox".to_string()
}

fn default_container() -> String {
    "mkv".to_string()
}

fn default_output_suffix() -> String {
    "qpilot".to_string()
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            encoder: default_encoder(),
            container: default_container(),
            output_suffix: default_output_suffix(),
            tolerance: default_tolerance(),
            target_mbps: None, // Tier table by source height
            overwrite: false,  // Never clobber outputs unless asked
            extra_encode_args: String::new(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("qpilot")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("qpilot")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            let config = Config::default();

            // Try to save the default config, but don't fail if we can't
            // (e.g., if the directory isn't writable)
            if let Err(e) = config.save() {
                eprintln!("Warning: Could not create default config file: {}", e);
                eprintln!(
                    "Using built-in defaults. Run 'qpilot init-config' to create a config file."
                );
            }

            Ok(config)
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            let config = Config::default();
            config.save()?;
        }
        Ok(())
    }
}
