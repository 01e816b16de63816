//! Page driver abstraction over a stateful rendering session.
//!
//! The crawler never touches the browser directly: it opens a page, asks for
//! expansion actions and item counts on the *current* page, and takes HTML
//! snapshots to parse. [`crate::scrapers::BrowserFetcher`] is the production
//! implementation; tests script their own.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use thiserror::Error;

/// Errors raised while fetching or driving a page.
///
/// All variants are recoverable at the call site: a failed category node is
/// skipped, a failed item yields a sentinel record.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ready marker '{selector}' did not appear on {url} within {waited:?}")]
    NotReady {
        url: String,
        selector: String,
        waited: Duration,
    },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("no page is open")]
    NoPage,
}

/// Fully rendered page content.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// URL the page was opened with.
    pub url: String,
    pub html: String,
}

impl RenderedDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// A client-side action that reveals more content on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Click the first element matching `selector`.
    Click { selector: String },
    /// Scroll the first element matching `anchor` into view.
    ScrollTo { anchor: String },
}

impl Expansion {
    pub fn click(selector: impl Into<String>) -> Self {
        Expansion::Click {
            selector: selector.into(),
        }
    }

    pub fn scroll_to(anchor: impl Into<String>) -> Self {
        Expansion::ScrollTo {
            anchor: anchor.into(),
        }
    }

    /// Selector of the control or anchor this action targets.
    pub fn target(&self) -> &str {
        match self {
            Expansion::Click { selector } => selector,
            Expansion::ScrollTo { anchor } => anchor,
        }
    }
}

/// A single rendering session the crawler drives one page at a time.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait, bounded, until `ready_selector` matches.
    async fn open(&mut self, url: &str, ready_selector: &str)
        -> Result<RenderedDocument, FetchError>;

    /// Perform `action` on the current page.
    ///
    /// Returns `false`, without acting, when the target is absent or not
    /// actionable (hidden or disabled).
    async fn expand(&mut self, action: &Expansion) -> Result<bool, FetchError>;

    /// Number of elements on the current page matching `selector`.
    async fn count(&mut self, selector: &str) -> Result<usize, FetchError>;

    /// Current rendered HTML of the open page.
    async fn snapshot(&mut self) -> Result<RenderedDocument, FetchError>;

    /// Switch off the toggle matching `selector` if it is currently on.
    ///
    /// Returns whether a click was made.
    async fn switch_off(&mut self, selector: &str) -> Result<bool, FetchError>;

    /// Release the session. Safe to call more than once.
    async fn close(&mut self);
}
