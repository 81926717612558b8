//! Runtime configuration resolved from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::sync::SYNC_INTERVAL;

pub const DEFAULT_API_URL: &str = "https://story-api.dicoding.dev/v1";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_CACHE_VERSION: &str = "v1";

/// File name of the offline submission database inside `data_dir`.
pub const QUEUE_DB_FILE: &str = "StoryAppDB.sqlite";
/// File name of the response cache database inside `data_dir`.
pub const CACHE_DB_FILE: &str = "ResponseCache.sqlite";

const ENV_API_URL: &str = "STORYSHARE_API_URL";
const ENV_DATA_DIR: &str = "STORYSHARE_DATA_DIR";
const ENV_APP_ORIGIN: &str = "STORYSHARE_APP_ORIGIN";
const ENV_CACHE_VERSION: &str = "STORYSHARE_CACHE_VERSION";
const ENV_SYNC_INTERVAL: &str = "STORYSHARE_SYNC_INTERVAL_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub cache_version: String,
    pub app_origin: String,
    pub sync_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: default_data_dir(),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            sync_interval: SYNC_INTERVAL,
        }
    }
}

impl Config {
    /// Resolve from process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup. Empty values are ignored.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get(ENV_API_URL) {
            cfg.api_base_url = v;
        }
        if let Some(v) = get(ENV_DATA_DIR) {
            cfg.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_APP_ORIGIN) {
            cfg.app_origin = v;
        }
        if let Some(v) = get(ENV_CACHE_VERSION) {
            cfg.cache_version = v;
        }
        if let Some(v) = get(ENV_SYNC_INTERVAL) {
            match v.parse::<u64>() {
                Ok(secs) if secs > 0 => cfg.sync_interval = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid {}={}", ENV_SYNC_INTERVAL, v),
            }
        }

        cfg
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn queue_db_path(&self) -> PathBuf {
        self.data_dir.join(QUEUE_DB_FILE)
    }

    pub fn cache_db_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_DB_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("storyshare")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_without_env() {
        let cfg = Config::from_vars(lookup(&[]));
        assert_eq!(cfg.api_base_url, DEFAULT_API_URL);
        assert_eq!(cfg.cache_version, "v1");
        assert_eq!(cfg.app_origin, DEFAULT_APP_ORIGIN);
        assert_eq!(cfg.sync_interval, Duration::from_secs(30));
        assert!(cfg.data_dir.ends_with("storyshare"));
    }

    #[test]
    fn test_env_overrides_defaults() {
        let cfg = Config::from_vars(lookup(&[
            ("STORYSHARE_API_URL", "http://127.0.0.1:9000/v1"),
            ("STORYSHARE_DATA_DIR", "/tmp/stories"),
            ("STORYSHARE_CACHE_VERSION", "v2"),
            ("STORYSHARE_SYNC_INTERVAL_SECS", "5"),
        ]));
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/stories"));
        assert_eq!(cfg.cache_version, "v2");
        assert_eq!(cfg.sync_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_and_invalid_values_are_ignored() {
        let cfg = Config::from_vars(lookup(&[
            ("STORYSHARE_API_URL", "   "),
            ("STORYSHARE_SYNC_INTERVAL_SECS", "soon"),
        ]));
        assert_eq!(cfg.api_base_url, DEFAULT_API_URL);
        assert_eq!(cfg.sync_interval, SYNC_INTERVAL);

        let cfg = Config::from_vars(lookup(&[("STORYSHARE_SYNC_INTERVAL_SECS", "0")]));
        assert_eq!(cfg.sync_interval, SYNC_INTERVAL);
    }

    #[test]
    fn test_database_paths_live_in_data_dir() {
        let cfg = Config::default().with_data_dir("/var/lib/storyshare");
        assert_eq!(
            cfg.queue_db_path(),
            PathBuf::from("/var/lib/storyshare/StoryAppDB.sqlite")
        );
        assert_eq!(
            cfg.cache_db_path(),
            PathBuf::from("/var/lib/storyshare/ResponseCache.sqlite")
        );
    }
}
