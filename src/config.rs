//! Configuration file parser for ~/.config/newsblob/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, but we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{ParseOptions, DEFAULT_LINK_BASE};
use crate::filter::FilterSet;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid link base '{0}': {1}")]
    LinkBase(String, url::ParseError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Regions whose regional articles are kept. Articles without a region
    /// are kept regardless.
    pub allowed_regions: BTreeSet<u16>,

    /// Rewrite straight quotes in headlines into German „…“ pairs.
    pub correct_quotation_marks: bool,

    /// Directory holding the `<SOURCE>.source` blob files.
    pub cache_dir: Option<PathBuf>,

    /// Persisted filter phrases (`^phrase`, `$phrase` or `phrase`).
    pub filters: Vec<String>,

    /// Base URL for relative content links.
    pub link_base: String,

    /// Wait before the single re-check of a busy source.
    pub lock_retry_delay_ms: u64,

    /// Sampling interval of parse progress.
    pub progress_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_regions: BTreeSet::new(),
            correct_quotation_marks: false,
            cache_dir: None,
            filters: Vec::new(),
            link_base: DEFAULT_LINK_BASE.to_string(),
            lock_retry_delay_ms: 250,
            progress_interval_ms: 100,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "allowed_regions",
        "correct_quotation_marks",
        "cache_dir",
        "filters",
        "link_base",
        "lock_retry_delay_ms",
        "progress_interval_ms",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading; a huge file is corrupt, not config.
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
                // deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            regions = config.allowed_regions.len(),
            filters = config.filters.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Default location: `$XDG_CONFIG_HOME/newsblob/config.toml`, falling back to `~/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("newsblob").join("config.toml"))
    }

    /// Parse options derived from this configuration.
    pub fn parse_options(&self) -> Result<ParseOptions, ConfigError> {
        let link_base = url::Url::parse(&self.link_base)
            .map_err(|e| ConfigError::LinkBase(self.link_base.clone(), e))?;
        Ok(ParseOptions {
            allowed_regions: self.allowed_regions.clone(),
            correct_quotation_marks: self.correct_quotation_marks,
            link_base: Some(link_base),
            ..ParseOptions::default()
        })
    }

    pub fn filter_set(&self) -> FilterSet {
        FilterSet::from_phrases(&self.filters)
    }

    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
