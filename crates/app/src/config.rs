// crates/app/src/config.rs
//! Core configuration, resolved from defaults and environment overrides.

use std::path::PathBuf;
use std::time::Duration;

/// Environment override for the on-disk data directory.
const ENV_DATA_DIR: &str = "MIZAN_DATA_DIR";
/// Environment override for the analysis API base URL.
const ENV_API_URL: &str = "MIZAN_API_URL";
/// Environment override for the connectivity probe URL.
const ENV_PROBE_URL: &str = "MIZAN_PROBE_URL";

const DEFAULT_API_URL: &str = "https://api.mizan.app";
const DEFAULT_PROBE_URL: &str = "https://clients3.google.com/generate_204";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Root of all on-device state: the three store directories and the
    /// cached contract documents.
    pub data_dir: PathBuf,
    pub api_base_url: String,
    pub probe_url: String,
    pub probe_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mizan");
        Self {
            data_dir,
            api_base_url: DEFAULT_API_URL.to_string(),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl CoreConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.api_base_url = url;
            }
        }
        if let Ok(url) = std::env::var(ENV_PROBE_URL) {
            if !url.trim().is_empty() {
                config.probe_url = url;
            }
        }
        config
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.data_dir.join("contracts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CoreConfig::default();
        assert!(config.data_dir.ends_with("mizan"));
        assert!(config.api_base_url.starts_with("https://"));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn contracts_dir_nests_under_data_dir() {
        let config = CoreConfig::default();
        assert!(config.contracts_dir().starts_with(&config.data_dir));
    }
}
