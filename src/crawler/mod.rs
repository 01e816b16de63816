//! Category crawler.
//!
//! The walker drives a [`PageDriver`] depth-first through the category graph.
//! Each node is classified, its lazily-loaded listings are exhausted, and the
//! item links found there are deduplicated, extracted and persisted.

mod classify;
mod driver;
mod extract;
mod ledger;
mod pagination;
mod persist;
mod profile;
mod walker;

pub use classify::{classify, leaf_links, parent_panel_links, Classification};
pub use driver::{Expansion, FetchError, PageDriver, RenderedDocument};
pub use extract::{extract, parse_item_page};
pub use ledger::{DedupLedger, VisitedSet};
pub use pagination::{exhaust, Exhausted, StopReason};
pub use persist::{BatchOutcome, BatchWriter};
pub use profile::{CompiledProfile, ProfileError, SiteProfile};
pub use walker::{CrawlSummary, Crawler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for one crawl run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    /// Wait after each expansion action before re-counting, in milliseconds.
    pub settle_ms: u64,
    /// Upper bound on expansion actions per pagination loop.
    pub max_expansions: usize,
    /// Records per store append.
    pub flush_every: usize,
    /// Total fetch attempts per category node.
    pub max_node_attempts: u32,
    /// Stop after extracting this many items (0 = no limit).
    pub max_items: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            settle_ms: 1500,
            max_expansions: 200,
            flush_every: 25,
            max_node_attempts: 2,
            max_items: 0,
        }
    }
}

impl CrawlOptions {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Shared cancellation signal, set from the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
