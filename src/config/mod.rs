//! Configuration for freshet.
//!
//! Read from `~/.config/freshet/config.toml` at startup. If the file does
//! not exist a commented default is written. Missing fields fall back to
//! defaults.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::app::{FreshetError, Result};

/// An interval expressed as days/hours/minutes (and optionally seconds,
/// for short daemon timers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct SyncInterval {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl SyncInterval {
    pub const fn new(days: u32, hours: u32, minutes: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds: 0,
        }
    }

    /// Parse interval strings like "4h", "30m", "7d", "90s" or combined
    /// "1d12h30m".
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim().to_lowercase();
        if s.is_empty() {
            return Err("Empty interval".into());
        }

        let mut interval = Self::new(0, 0, 0);
        let mut digits = String::new();
        for c in s.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let value: u32 = digits
                .parse()
                .map_err(|_| format!("Invalid interval: {}. Use format like '4h', '30m', '7d'", s))?;
            match c {
                'd' => interval.days = value,
                'h' => interval.hours = value,
                'm' => interval.minutes = value,
                's' => interval.seconds = value,
                _ => {
                    return Err(format!(
                        "Invalid interval: {}. Use format like '4h', '30m', '7d'",
                        s
                    ))
                }
            }
            digits.clear();
        }
        if !digits.is_empty() {
            return Err(format!(
                "Invalid interval: {}. Use format like '4h', '30m', '7d'",
                s
            ));
        }
        Ok(interval)
    }

    pub fn as_duration(&self) -> Duration {
        let secs = u64::from(self.days) * 86400
            + u64::from(self.hours) * 3600
            + u64::from(self.minutes) * 60
            + u64::from(self.seconds);
        Duration::from_secs(secs)
    }

    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.as_duration()).unwrap_or(chrono::Duration::zero())
    }
}

impl std::fmt::Display for SyncInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}h{}m", self.days, self.hours, self.minutes)?;
        if self.seconds > 0 {
            write!(f, "{}s", self.seconds)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for SyncInterval {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

/// Refresh-eligibility intervals.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Minimum gap after a successful fetch before the feed is due again.
    pub success_interval: SyncInterval,
    /// Extra backoff after a failed fetch, applied on top of the
    /// success interval.
    pub failure_backoff: SyncInterval,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            success_interval: SyncInterval::new(0, 4, 0),
            failure_backoff: SyncInterval::new(7, 0, 0),
        }
    }
}

/// Batch sync settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Parallel workers for the batch driver.
    pub workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

/// Integrity audit settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base urls whose title+published+content duplicates with a missing
    /// uri may be auto-deleted. A legacy cleanup carve-out, not a general
    /// policy; leave empty to disable the delete path entirely.
    pub legacy_cleanup_hosts: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            legacy_cleanup_hosts: vec![
                "http://www.jpl.nasa.gov".into(),
                "http://blog.tmorris.net".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub refresh: RefreshConfig,
    pub sync: SyncConfig,
    pub audit: AuditConfig,
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from the default path when
    /// none is given, creating a commented default file when missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(FreshetError::Config(format!(
                    "Config file not found: {}",
                    config_path.display()
                )));
            }
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| FreshetError::Config(format!("{}: {}", config_path.display(), e)))?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FreshetError::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("freshet").join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;
        Ok(())
    }
}

const DEFAULT_CONFIG: &str = r#"# freshet configuration

[refresh]
# Minimum gap after a successful fetch before a feed is due again.
success_interval = "0d4h0m"
# Backoff before retrying a feed whose last fetch failed.
failure_backoff = "7d0h0m"

[sync]
# Parallel workers for batch sync.
workers = 10

[audit]
# Base urls whose uri-less duplicates the auditor may delete.
legacy_cleanup_hosts = ["http://www.jpl.nasa.gov", "http://blog.tmorris.net"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(SyncInterval::parse("4h").unwrap(), SyncInterval::new(0, 4, 0));
        assert_eq!(SyncInterval::parse("30m").unwrap(), SyncInterval::new(0, 0, 30));
        assert_eq!(SyncInterval::parse("7d").unwrap(), SyncInterval::new(7, 0, 0));
        assert_eq!(
            SyncInterval::parse("1d12h30m").unwrap(),
            SyncInterval::new(1, 12, 30)
        );
        assert_eq!(
            SyncInterval::parse("0d4h0m").unwrap(),
            SyncInterval::new(0, 4, 0)
        );
        assert!(SyncInterval::parse("invalid").is_err());
        assert!(SyncInterval::parse("4x").is_err());
        assert!(SyncInterval::parse("3600").is_err());
        assert!(SyncInterval::parse("").is_err());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(SyncInterval::parse("90s").unwrap().as_duration().as_secs(), 90);
        assert_eq!(
            SyncInterval::parse("1m30s").unwrap().as_duration().as_secs(),
            90
        );
        assert_eq!(SyncInterval::parse("1h").unwrap().as_duration().as_secs(), 3600);
        assert!(SyncInterval::parse("0s").unwrap().is_zero());
        assert!(!SyncInterval::parse("1s").unwrap().is_zero());
    }

    #[test]
    fn test_interval_display_includes_seconds_only_when_set() {
        assert_eq!(SyncInterval::parse("90s").unwrap().to_string(), "0d0h0m90s");
        assert_eq!(SyncInterval::new(0, 1, 0).to_string(), "0d1h0m");
        let with_secs = SyncInterval::parse("1h5s").unwrap();
        assert_eq!(SyncInterval::parse(&with_secs.to_string()).unwrap(), with_secs);
    }

    #[test]
    fn test_interval_duration() {
        assert_eq!(SyncInterval::new(0, 4, 0).as_duration().as_secs(), 4 * 3600);
        assert_eq!(SyncInterval::new(7, 0, 0).as_duration().as_secs(), 7 * 86400);
        assert_eq!(
            SyncInterval::new(1, 2, 3).as_duration().as_secs(),
            86400 + 2 * 3600 + 3 * 60
        );
    }

    #[test]
    fn test_interval_display_roundtrip() {
        let interval = SyncInterval::new(1, 12, 30);
        assert_eq!(SyncInterval::parse(&interval.to_string()).unwrap(), interval);
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [refresh]
            success_interval = "2h"
            failure_backoff = "3d"

            [sync]
            workers = 4

            [audit]
            legacy_cleanup_hosts = []
            "#,
        )
        .unwrap();
        assert_eq!(config.refresh.success_interval, SyncInterval::new(0, 2, 0));
        assert_eq!(config.refresh.failure_backoff, SyncInterval::new(3, 0, 0));
        assert_eq!(config.sync.workers, 4);
        assert!(config.audit.legacy_cleanup_hosts.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.refresh.success_interval, SyncInterval::new(0, 4, 0));
        assert_eq!(config.refresh.failure_backoff, SyncInterval::new(7, 0, 0));
        assert_eq!(config.sync.workers, 10);
        assert_eq!(config.audit.legacy_cleanup_hosts.len(), 2);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync]\nworkers = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sync.workers, 3);

        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.refresh.success_interval, SyncInterval::new(0, 4, 0));
    }
}
