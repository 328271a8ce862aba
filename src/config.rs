//! Persistent command-line configuration model and file-backed manager.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use redmine_api::config::{DEFAULT_BASE_URL, DEFAULT_COOLDOWN_MS, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};

use crate::analytics::DEFAULT_CLOSED_STATUS_PATTERN;
use crate::layout::ReportLanguage;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Longest accepted look-ahead for the "due soon" list, about ten years.
pub const MAX_UPCOMING_WINDOW_DAYS: u32 = 3650;

/// Default look-ahead for the "due soon" list.
fn default_upcoming_window_days() -> u32 {
    7
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_closed_status_pattern() -> String {
    DEFAULT_CLOSED_STATUS_PATTERN.to_string()
}

fn default_request_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Settings persisted on disk. Connection secrets live in the keyring, not here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Fetch closed issues too (`status_id=*`).
    #[serde(default)]
    pub include_closed: bool,
    #[serde(default)]
    pub report_language: ReportLanguage,
    #[serde(default = "default_upcoming_window_days")]
    pub upcoming_window_days: u32,
    #[serde(default = "default_closed_status_pattern")]
    pub closed_status_pattern: String,
    #[serde(default = "default_request_cooldown_ms")]
    pub request_cooldown_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long a fetched issue list is reused; `0` turns the cache off.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            include_closed: false,
            report_language: ReportLanguage::default(),
            upcoming_window_days: default_upcoming_window_days(),
            closed_status_pattern: default_closed_status_pattern(),
            request_cooldown_ms: default_request_cooldown_ms(),
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Config {
    pub fn request_cooldown(&self) -> Duration {
        Duration::from_millis(self.request_cooldown_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Updates one setting from its `key` and textual `value`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            "base_url" => {
                if value.is_empty() {
                    return Err("base_url must not be empty".into());
                }
                self.base_url = value.trim_end_matches('/').to_string();
            }
            "page_size" => self.page_size = parse_number(key, value)?,
            "include_closed" => {
                self.include_closed = value
                    .parse()
                    .map_err(|_| format!("include_closed expects true or false, got {value}"))?
            }
            "report_language" => self.report_language = value.parse()?,
            "upcoming_window_days" => {
                let days: u32 = parse_number(key, value)?;
                if days > MAX_UPCOMING_WINDOW_DAYS {
                    return Err(format!(
                        "upcoming_window_days must be at most {MAX_UPCOMING_WINDOW_DAYS}, got {days}"
                    ));
                }
                self.upcoming_window_days = days;
            }
            "closed_status_pattern" => {
                regex::Regex::new(value)
                    .map_err(|err| format!("invalid closed_status_pattern: {err}"))?;
                self.closed_status_pattern = value.to_string();
            }
            "request_cooldown_ms" => self.request_cooldown_ms = parse_number(key, value)?,
            "timeout_secs" => self.timeout_secs = parse_number(key, value)?,
            "cache_ttl_secs" => self.cache_ttl_secs = parse_number(key, value)?,
            other => return Err(format!("unknown config key: {other}")),
        }
        Ok(())
    }

    /// `(key, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("base_url", self.base_url.clone()),
            ("page_size", self.page_size.to_string()),
            ("include_closed", self.include_closed.to_string()),
            ("report_language", self.report_language.to_string()),
            ("upcoming_window_days", self.upcoming_window_days.to_string()),
            ("closed_status_pattern", self.closed_status_pattern.clone()),
            ("request_cooldown_ms", self.request_cooldown_ms.to_string()),
            ("timeout_secs", self.timeout_secs.to_string()),
            ("cache_ttl_secs", self.cache_ttl_secs.to_string()),
        ]
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{key} expects a non-negative number, got {value}"))
}

/// Loads and saves [`Config`] as a JSON file in the platform config directory.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager bound to the platform-specific config path.
    pub fn new() -> Result<Self, String> {
        let dirs = directories::ProjectDirs::from("org", "redmine-report", "redmine-report")
            .ok_or_else(|| "could not determine config directory".to_string())?;
        Ok(Self::with_path(dirs.config_dir().join("config.json")))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads config from disk, falling back to defaults on read/parse errors.
    pub fn load(&self) -> Config {
        if !self.path.exists() {
            return Config::default();
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                log::warn!("ignoring unreadable config {}: {err}", self.path.display());
                Config::default()
            }),
            Err(err) => {
                log::warn!("failed to read config {}: {err}", self.path.display());
                Config::default()
            }
        }
    }

    /// Persists config to disk, creating parent directories when needed.
    pub fn save(&self, config: &Config) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigManager};
    use crate::layout::ReportLanguage;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("redmine-report-tests-{name}-{nanos}/config.json"))
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.page_size, 100);
        assert!(!config.include_closed);
        assert_eq!(config.report_language, ReportLanguage::Ja);
        assert_eq!(config.upcoming_window_days, 7);
        assert_eq!(config.closed_status_pattern, "終了|完了|解決済み|Closed|Resolved|Rejected");
        assert_eq!(config.request_cooldown_ms, 100);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.cache_ttl_secs, 600);
    }

    #[test]
    fn load_missing_file_returns_default() {
        let manager = ConfigManager::with_path(unique_path("missing"));
        assert_eq!(manager.load(), Config::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = unique_path("roundtrip");
        let parent = path.parent().map(ToOwned::to_owned);

        let manager = ConfigManager::with_path(path.clone());
        let config = Config {
            base_url: "https://redmine.example.com".to_string(),
            page_size: 50,
            include_closed: true,
            report_language: ReportLanguage::En,
            upcoming_window_days: 14,
            ..Config::default()
        };

        manager.save(&config).expect("save should succeed");
        assert_eq!(manager.load(), config);

        if let Some(parent) = parent {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn load_invalid_json_falls_back_to_default() {
        let path = unique_path("invalid");
        let parent = path.parent().expect("parent must exist");
        fs::create_dir_all(parent).expect("create temp directory");
        fs::write(&path, "not-valid-json").expect("write invalid config");

        let manager = ConfigManager::with_path(path.clone());
        assert_eq!(manager.load(), Config::default());

        let _ = fs::remove_dir_all(parent);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let path = unique_path("partial");
        let parent = path.parent().expect("parent must exist");
        fs::create_dir_all(parent).expect("create temp directory");
        fs::write(&path, r#"{"page_size": 25, "report_language": "en"}"#).expect("write config");

        let loaded = ConfigManager::with_path(path.clone()).load();
        assert_eq!(loaded.page_size, 25);
        assert_eq!(loaded.report_language, ReportLanguage::En);
        assert_eq!(loaded.upcoming_window_days, 7);
        assert_eq!(loaded.base_url, "http://localhost:3000");

        let _ = fs::remove_dir_all(parent);
    }

    #[test]
    fn set_validates_values() {
        let mut config = Config::default();
        config.set("base_url", "https://redmine.example.com/").unwrap();
        config.set("include_closed", "true").unwrap();
        config.set("report_language", "EN").unwrap();
        config.set("upcoming_window_days", "3").unwrap();

        assert_eq!(config.base_url, "https://redmine.example.com");
        assert!(config.include_closed);
        assert_eq!(config.report_language, ReportLanguage::En);
        assert_eq!(config.upcoming_window_days, 3);

        assert!(config.set("page_size", "-1").is_err());
        assert!(config.set("closed_status_pattern", "(").is_err());
        assert!(config.set("report_language", "fr").is_err());
        assert!(config.set("nope", "1").is_err());
    }

    #[test]
    fn set_rejects_window_beyond_ten_years() {
        let mut config = Config::default();
        let err = config
            .set("upcoming_window_days", "4000000000")
            .expect_err("window should be rejected");
        assert!(err.contains("at most 3650"));
        assert_eq!(config.upcoming_window_days, 7);

        config.set("upcoming_window_days", "3650").unwrap();
        assert_eq!(config.upcoming_window_days, 3650);
    }

    #[test]
    fn cache_ttl_can_be_disabled() {
        let mut config = Config::default();
        config.set("cache_ttl_secs", "0").unwrap();
        assert!(config.cache_ttl().is_zero());
        assert!(config
            .entries()
            .iter()
            .any(|(key, value)| *key == "cache_ttl_secs" && value == "0"));
    }
}
