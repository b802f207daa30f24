//! Configuration file parser for ~/.config/appcast-reader/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::platform::{OsVersion, OsVersionError, Platform};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid os_version in config file: {0}")]
    InvalidOsVersion(#[from] OsVersionError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// How the CLI prints the loaded updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OS tag to match enclosures against instead of the compiled-in OS.
    pub os: Option<String>,

    /// Architecture tag (`x64`, `x86`, `arm64`) instead of the compiled-in one.
    pub arch: Option<String>,

    /// Running OS version, enabling the `sparkle:minimumSystemVersion` filter.
    pub os_version: Option<String>,

    /// Report format.
    pub output: OutputFormat,

    /// Feed files larger than this are refused.
    pub max_feed_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            os: None,
            arch: None,
            os_version: None,
            output: OutputFormat::Text,
            max_feed_bytes: Self::DEFAULT_MAX_FEED_BYTES,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    pub const DEFAULT_MAX_FEED_BYTES: u64 = 10 * 1024 * 1024; // 10MB

    /// Default location: `$HOME/.config/appcast-reader/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("appcast-reader")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["os", "arch", "os_version", "output", "max_feed_bytes"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), output = ?config.output, "Loaded configuration");
        Ok(config)
    }

    /// The platform to select updates for: the running platform with any
    /// configured overrides applied.
    ///
    /// The detected OS version is only kept while the OS itself is not
    /// overridden.
    pub fn platform(&self) -> Result<Platform, ConfigError> {
        let current = Platform::current();
        let os = self.os.as_deref().unwrap_or(current.os());
        let arch = self.arch.as_deref().unwrap_or(current.arch());
        let platform = Platform::new(os, arch);

        let version = match self.os_version.as_deref() {
            Some(version) => Some(version.parse::<OsVersion>()?),
            None if platform.os() == current.os() => current.version().cloned(),
            None => None,
        };
        Ok(match version {
            Some(version) => platform.with_version(version),
            None => platform,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
