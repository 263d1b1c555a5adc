use std::sync::OnceLock;
use std::time::Duration;

/// Controller address when `TRAFFIC_API_URL` is not set at build time.
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

pub const DEFAULT_CHAT_FALLBACK: &str = "Gemini AI: Service temporarily unavailable.";

/// Strips whitespace and trailing slashes; blank input falls back to the default.
pub fn normalize_api_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Browsers have no process environment, so the override is baked in at
/// compile time.
fn resolve_api_base() -> String {
    normalize_api_base(option_env!("TRAFFIC_API_URL").unwrap_or(DEFAULT_API_BASE))
}

static API_BASE_CACHE: OnceLock<String> = OnceLock::new();

/// Get the cached API base URL
pub fn api_base() -> &'static str {
    API_BASE_CACHE.get_or_init(resolve_api_base).as_str()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_base: String,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub chat_fallback: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: api_base().to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            tick_interval: COUNTDOWN_TICK,
            chat_fallback: DEFAULT_CHAT_FALLBACK.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = normalize_api_base(base);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_chat_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.chat_fallback = fallback.into();
        self
    }

    /// Poll interval in whole seconds, for display.
    pub fn refresh_label(&self) -> String {
        format!("{}s", self.poll_interval.as_secs())
    }
}
