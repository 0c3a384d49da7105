//! Push scheduler configuration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::direct::DirectScheduler;
use super::selector::RouteSelectorConfig;

/// Push scheduler configuration
///
/// An empty `schedulers` list means single mode with `scheduler`; otherwise
/// the facade runs in selectable mode and `selector` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSchedulerConfig {
    /// Strategy kind for single mode
    #[serde(default = "default_scheduler")]
    pub scheduler: String,

    /// Options handed to the single-mode strategy
    #[serde(default)]
    pub options: Value,

    /// Named strategies for selectable mode
    #[serde(default)]
    pub schedulers: Vec<SchedulerEntryConfig>,

    /// Route-prefix selector for selectable mode
    #[serde(default)]
    pub selector: Option<RouteSelectorConfig>,
}

fn default_scheduler() -> String {
    debug!("default_scheduler: called");
    DirectScheduler::KIND.to_string()
}

impl Default for PushSchedulerConfig {
    fn default() -> Self {
        debug!("PushSchedulerConfig::default: called");
        Self {
            scheduler: default_scheduler(),
            options: Value::Null,
            schedulers: Vec::new(),
            selector: None,
        }
    }
}

impl PushSchedulerConfig {
    pub fn is_selectable(&self) -> bool {
        !self.schedulers.is_empty()
    }
}

/// One named entry of the selectable table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerEntryConfig {
    pub id: String,

    /// Catalog kind (`direct`, `buffer`, ...)
    pub kind: String,

    #[serde(default)]
    pub options: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_direct() {
        let config = PushSchedulerConfig::default();
        assert_eq!(config.scheduler, "direct");
        assert!(!config.is_selectable());
        assert!(config.options.is_null());
    }

    #[test]
    fn test_parse_selectable() {
        let yaml = r#"
schedulers:
  - id: fast
    kind: direct
  - id: slow
    kind: buffer
    options:
      flush-interval-ms: 100
selector:
  default: fast
  routes:
    chat.: slow
"#;
        let config: PushSchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_selectable());
        assert_eq!(config.schedulers.len(), 2);
        assert_eq!(config.schedulers[1].kind, "buffer");
        assert_eq!(config.schedulers[1].options["flush-interval-ms"], 100);
        let selector = config.selector.unwrap();
        assert_eq!(selector.default, "fast");
        assert_eq!(selector.routes["chat."], "slow");
    }

    #[test]
    fn test_parse_empty() {
        let config: PushSchedulerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, PushSchedulerConfig::default());
    }
}
