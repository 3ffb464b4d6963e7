// ⚙️ Normalizer Configuration
//
// Everything the pipeline needs from the outside world that is not data:
// the not-null defaults, the progress log interval and the (dormant)
// legislature window.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REGION_CODE: &str = "UNDEFINED";
pub const DEFAULT_CATEGORY_NAME: &str = "OUTROS";
pub const DEFAULT_PARTY_CODE: &str = "OUTROS";
pub const DEFAULT_LOG_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Substituted for a null/blank region code
    pub default_region_code: String,

    /// Substituted for a null/blank category name
    pub default_category_name: String,

    /// Substituted for a null/blank party code
    pub default_party_code: String,

    /// Minimum time between two progress messages
    pub log_interval_ms: u64,

    /// When set, documents outside the window are excluded. Off by default.
    pub legislature_window: Option<LegislatureWindow>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            default_region_code: DEFAULT_REGION_CODE.to_string(),
            default_category_name: DEFAULT_CATEGORY_NAME.to_string(),
            default_party_code: DEFAULT_PARTY_CODE.to_string(),
            log_interval_ms: DEFAULT_LOG_INTERVAL_MS,
            legislature_window: None,
        }
    }
}

impl NormalizerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse normalizer config")
    }

    /// Load from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }
}

// ============================================================================
// LEGISLATURE WINDOW
// ============================================================================

/// Inclusive (year, month) range of a legislature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegislatureWindow {
    pub first_year: i32,
    pub first_month: u32,
    pub last_year: i32,
    pub last_month: u32,
}

impl LegislatureWindow {
    /// 55th legislature: 02/2015 through 01/2019
    pub fn fifty_fifth() -> Self {
        LegislatureWindow {
            first_year: 2015,
            first_month: 2,
            last_year: 2019,
            last_month: 1,
        }
    }

    pub fn contains(&self, year: i32, month: u32) -> bool {
        let at = (year, month);
        at >= (self.first_year, self.first_month) && at <= (self.last_year, self.last_month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NormalizerConfig::default();
        assert_eq!(config.default_region_code, "UNDEFINED");
        assert_eq!(config.default_category_name, "OUTROS");
        assert_eq!(config.default_party_code, "OUTROS");
        assert_eq!(config.log_interval(), Duration::from_secs(5));
        assert!(config.legislature_window.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NormalizerConfig::from_toml_str(
            r#"
            default_region_code = "NA"
            log_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.default_region_code, "NA");
        assert_eq!(config.log_interval_ms, 250);
        assert_eq!(config.default_party_code, "OUTROS");
    }

    #[test]
    fn test_toml_with_window() {
        let config = NormalizerConfig::from_toml_str(
            r#"
            [legislature_window]
            first_year = 2015
            first_month = 2
            last_year = 2019
            last_month = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.legislature_window, Some(LegislatureWindow::fifty_fifth()));
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(NormalizerConfig::from_toml_str("log_interval_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let window = LegislatureWindow::fifty_fifth();

        assert!(!window.contains(2015, 1));
        assert!(window.contains(2015, 2));
        assert!(window.contains(2017, 7));
        assert!(window.contains(2019, 1));
        assert!(!window.contains(2019, 2));
        assert!(!window.contains(2014, 12));
        assert!(!window.contains(2020, 1));
    }
}
