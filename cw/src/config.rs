//! ClusterWatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::push::PushSchedulerConfig;
use crate::watchdog::WatchdogConfig;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".clusterwatch.yml";

/// Main ClusterWatch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Membership watchdog
    pub watchdog: WatchdogConfig,

    /// Push scheduler facade
    #[serde(rename = "push-scheduler")]
    pub push_scheduler: PushSchedulerConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed here; `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        match config_path {
            Some(path) => Self::load_from_file(path).ok()?.log_level,
            None => Self::candidates()
                .into_iter()
                .filter(|candidate| candidate.exists())
                .find_map(|candidate| Self::load_from_file(&candidate).ok())
                .and_then(|config| config.log_level),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Implicit config locations, in priority order
    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        // ~/.config/clusterwatch/clusterwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("clusterwatch").join("clusterwatch.yml"));
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.log_level, None);
        assert_eq!(config.watchdog.channel_buffer, 1000);
        assert_eq!(config.push_scheduler.scheduler, "direct");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

watchdog:
  channel-buffer: 64
  expected-servers: 3

push-scheduler:
  schedulers:
    - id: fast
      kind: direct
    - id: slow
      kind: buffer
  selector:
    default: fast
    routes:
      chat.: slow
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.watchdog.channel_buffer, 64);
        assert_eq!(config.watchdog.bus_capacity, 1024);
        assert_eq!(config.watchdog.expected_servers, Some(3));
        assert!(config.push_scheduler.is_selectable());
        assert_eq!(config.push_scheduler.schedulers[1].id, "slow");
    }

    #[test]
    fn test_load_explicit_path() {
        let file = write_config("watchdog:\n  expected-servers: 2\n");
        let path = file.path().to_path_buf();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.watchdog.expected_servers, Some(2));
    }

    #[test]
    fn test_load_explicit_path_errors() {
        let missing = PathBuf::from("/nonexistent/clusterwatch.yml");
        assert!(Config::load(Some(&missing)).is_err());

        let file = write_config("watchdog: [not, a, map]\n");
        let path = file.path().to_path_buf();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_log_level() {
        let file = write_config("log-level: TRACE\n");
        let path = file.path().to_path_buf();
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("TRACE"));

        let file = write_config("watchdog: {}\n");
        let path = file.path().to_path_buf();
        assert_eq!(Config::load_log_level(Some(&path)), None);

        let missing = PathBuf::from("/nonexistent/clusterwatch.yml");
        assert_eq!(Config::load_log_level(Some(&missing)), None);
    }

    #[test]
    fn test_serialize_round_trip_keys() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("push-scheduler:"));
        assert!(yaml.contains("channel-buffer: 1000"));
        assert!(!yaml.contains("log-level"));
    }
}
