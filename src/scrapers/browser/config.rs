//! Browser engine configuration types.

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the crawl.
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Navigation timeout in seconds.
    pub timeout: u64,

    /// How long to wait for a page's ready marker, in seconds.
    pub ready_timeout: u64,

    /// Interval between ready-marker polls, in milliseconds.
    pub poll_interval_ms: u64,

    /// Pause before every navigation, in milliseconds.
    pub request_delay_ms: u64,

    /// User agent override. Uses the browser's own when unset.
    pub user_agent: Option<String>,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            timeout: 30,
            ready_timeout: 15,
            poll_interval_ms: 250,
            request_delay_ms: 0,
            user_agent: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment overrides (`BROWSER_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BROWSER_URL") {
            if !url.is_empty() {
                self.remote_url = Some(url);
            }
        }
        self
    }

    /// Number of ready-marker polls that fit in `ready_timeout`.
    pub fn ready_attempts(&self) -> u64 {
        let interval = self.poll_interval_ms.max(1);
        ((self.ready_timeout * 1000) / interval).max(1)
    }
}
