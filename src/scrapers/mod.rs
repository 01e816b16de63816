//! Page acquisition backends.

pub mod browser;

pub use browser::{BrowserEngineConfig, BrowserFetcher};
