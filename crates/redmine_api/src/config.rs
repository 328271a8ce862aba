use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_USER_AGENT: &str = "redmine-report";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Redmine caps `limit` on listing endpoints at 100.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_COOLDOWN_MS: u64 = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Lowercase so it can be used with `HeaderName::from_static`.
pub const API_KEY_HEADER: &str = "x-redmine-api-key";

#[derive(Clone, Debug)]
pub struct RedmineConfig {
    pub base_url: String,
    pub api_key: String,
    pub user_agent: String,
    pub page_size: u32,
    pub cooldown: Duration,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl RedmineConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_cooldown(mut self, duration: Duration) -> Self {
        self.cooldown = duration;
        self
    }

    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Base URL with exactly one trailing slash, ready for `<resource>.json` suffixes.
    pub fn api_root(&self) -> String {
        format!("{}/", self.base_url.trim().trim_end_matches('/'))
    }
}
