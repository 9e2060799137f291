//! Configuration for the session engine

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default storage key of the persisted session record
pub const DEFAULT_STORAGE_KEY: &str = "session.v1";

/// Session engine configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Root directory for the file-backed medium
    pub storage_dir: PathBuf,

    /// Key the session record lives under
    pub storage_key: String,

    /// Lifetime stamped into `expires_at` on login (None = non-expiring)
    pub session_ttl: Option<Duration>,

    /// How often the file medium checks for foreign writes
    pub sync_poll_interval: Duration,

    /// Capacity of the actor mailbox and event channels
    pub channel_capacity: usize,

    /// Redirects the guard follows before reporting a loop
    pub max_redirect_hops: usize,
}

impl SessionConfig {
    /// Create config with sensible defaults
    ///
    /// # Arguments
    /// * `storage_dir` - Directory for persisted records.
    ///   Structure created by the file medium:
    ///   ```text
    ///   storage_dir/
    ///   └── session.v1.json   (one atomic record)
    ///   ```
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            storage_key: std::env::var("MARKETPLACE_SESSION_KEY")
                .unwrap_or_else(|_| DEFAULT_STORAGE_KEY.to_string()),
            session_ttl: None,
            sync_poll_interval: Duration::from_millis(500),
            channel_capacity: 256,
            max_redirect_hops: 8,
        }
    }

    /// Override the storage key
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Stamp an expiry on new sessions
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    /// Override the file poll period
    pub fn with_sync_poll_interval(mut self, interval: Duration) -> Self {
        self.sync_poll_interval = interval;
        self
    }

    /// Override channel capacity (minimum 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Override the redirect hop limit
    pub fn with_max_redirect_hops(mut self, hops: usize) -> Self {
        self.max_redirect_hops = hops;
        self
    }

    /// Path of the file holding a given key
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(format!("{key}.json"))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("marketplace-session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = SessionConfig::new("/tmp/test_sessions").with_storage_key(DEFAULT_STORAGE_KEY);
        assert_eq!(cfg.session_ttl, None);
        assert_eq!(cfg.channel_capacity, 256);
        assert_eq!(cfg.max_redirect_hops, 8);
        assert_eq!(
            cfg.record_path(&cfg.storage_key),
            PathBuf::from("/tmp/test_sessions/session.v1.json")
        );
    }

    #[test]
    fn test_builder_pattern() {
        let cfg = SessionConfig::new("/data")
            .with_storage_key("session.test")
            .with_session_ttl(Duration::from_secs(3600))
            .with_sync_poll_interval(Duration::from_millis(50))
            .with_channel_capacity(0)
            .with_max_redirect_hops(3);

        assert_eq!(cfg.storage_key, "session.test");
        assert_eq!(cfg.session_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.sync_poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.channel_capacity, 1);
        assert_eq!(cfg.max_redirect_hops, 3);
    }
}
