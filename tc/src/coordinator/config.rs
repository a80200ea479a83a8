//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Capacity of the notification queue; producers block when it is full
    #[serde(rename = "channel-capacity", default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Give up waiting for a release after this long (wait forever if unset)
    #[serde(rename = "release-timeout-ms", default)]
    pub release_timeout_ms: Option<u64>,

    /// Asynchronous actions allowed in flight before the queue stops draining
    #[serde(rename = "max-pending-async-actions", default = "default_max_pending_async_actions")]
    pub max_pending_async_actions: usize,

    /// Capacity of the history broadcast channel
    #[serde(rename = "history-capacity", default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_channel_capacity() -> usize {
    debug!("default_channel_capacity: called");
    500
}

fn default_max_pending_async_actions() -> usize {
    debug!("default_max_pending_async_actions: called");
    1
}

fn default_history_capacity() -> usize {
    debug!("default_history_capacity: called");
    4096
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            channel_capacity: 500,
            release_timeout_ms: None,
            max_pending_async_actions: 1,
            history_capacity: 4096,
        }
    }
}

impl CoordinatorConfig {
    /// Release timeout as a Duration, if one is configured
    pub fn release_timeout(&self) -> Option<Duration> {
        debug!(release_timeout_ms = ?self.release_timeout_ms, "CoordinatorConfig::release_timeout: called");
        self.release_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.channel_capacity, 500);
        assert_eq!(config.release_timeout_ms, None);
        assert_eq!(config.max_pending_async_actions, 1);
        assert!(config.release_timeout().is_none());
    }

    #[test]
    fn test_release_timeout_duration() {
        let config = CoordinatorConfig {
            release_timeout_ms: Some(2500),
            ..Default::default()
        };
        assert_eq!(config.release_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("channel-capacity: 16").unwrap();
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.max_pending_async_actions, 1);
        assert_eq!(config.history_capacity, 4096);
    }
}
