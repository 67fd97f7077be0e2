//! Configuration management for Tabula.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/tabula/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target portal endpoints
    pub portal: PortalConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// CAPTCHA recognition settings
    pub ocr: OcrConfig,
    /// Attempt-loop tuning
    pub scrape: ScrapeConfig,
    /// Export artifact settings
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TABULA_HEADLESS`: Override browser headless mode (true/false)
    /// - `TABULA_OCR_URL`: Override the OCR service endpoint
    /// - `TABULA_SETTLE_MS`: Override the post-submit settle delay
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("TABULA_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("TABULA_OCR_URL") {
            config.ocr.endpoint_url = val;
            tracing::debug!("Override ocr.endpoint_url from env");
        }

        if let Ok(val) = std::env::var("TABULA_SETTLE_MS") {
            if let Ok(ms) = val.parse() {
                config.scrape.settle_ms = ms;
                tracing::debug!("Override scrape.settle_ms from env: {}", ms);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tabula/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tabula", "tabula").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/tabula`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tabula", "tabula").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Target portal endpoints and selectors that vary per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Programme-select entry page the session starts from
    pub entry_url: String,
    /// Base URL captcha image paths are resolved against
    pub result_base_url: String,
    /// Element id of the programme radio option clicked once per session
    pub program_option_id: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            entry_url: "http://result.rgpv.ac.in/Result/ProgramSelect.aspx".to_string(),
            result_base_url: "http://result.rgpv.ac.in/result/".to_string(),
            program_option_id: "radlstProgram_1".to_string(),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
        }
    }
}

/// CAPTCHA recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// OCR service endpoint the captcha image is posted to
    pub endpoint_url: String,
    /// Per-request timeout in seconds (covers image fetch and OCR call)
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8884/tesseract".to_string(),
            timeout_secs: 12,
        }
    }
}

/// Attempt-loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Attempts per identifier before it is recorded as unresolved
    pub max_attempts: u32,
    /// Identifiers processed before the session is retired and recreated
    pub rotate_after: u32,
    /// Consecutive failures before a page refresh is attempted
    pub refresh_after_failures: u32,
    /// Delay after typing/submitting before the response is inspected
    pub settle_ms: u64,
    /// Recognized captcha text shorter than this is retried without submitting
    pub min_captcha_len: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rotate_after: 10,
            refresh_after_failures: 5,
            settle_ms: 1500,
            min_captcha_len: 4,
        }
    }
}

/// Export artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory artifacts are written to; system temp dir when unset
    pub output_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { output_dir: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.scrape.max_attempts, 3);
        assert_eq!(config.scrape.rotate_after, 10);
        assert_eq!(config.scrape.refresh_after_failures, 5);
        assert!(config.portal.entry_url.contains("ProgramSelect"));
        assert!(config.export.output_dir.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[portal]"));
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("[scrape]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.portal.entry_url, config.portal.entry_url);
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.browser.headless = false;
        config.scrape.settle_ms = 500;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert!(!loaded.browser.headless);
        assert_eq!(loaded.scrape.settle_ms, 500);
    }

    #[test]
    fn test_partial_config() {
        // Partial TOML configs fill in defaults
        let toml_str = r#"
[scrape]
max_attempts = 5
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scrape.max_attempts, 5);
        // These should be defaults
        assert_eq!(config.scrape.rotate_after, 10);
        assert!(config.browser.headless);
    }
}
