//! Per-run sets of visited categories and already-persisted items.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::repository::CsvStore;

/// Category URLs visited during one crawl run.
#[derive(Debug, Default)]
pub struct VisitedSet {
    visited: HashSet<String>,
    attempts: HashMap<String, u32>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Mark `url` visited. Returns false if it already was.
    pub fn mark(&mut self, url: &str) -> bool {
        if !self.visited.insert(url.to_string()) {
            return false;
        }
        *self.attempts.entry(url.to_string()).or_insert(0) += 1;
        true
    }

    /// Unmark `url` after a failed visit so another path may retry it.
    pub fn forget(&mut self, url: &str) {
        self.visited.remove(url);
    }

    /// How many times `url` has been marked.
    pub fn attempts(&self, url: &str) -> u32 {
        self.attempts.get(url).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// Canonical item URLs already extracted, in this run or a previous one.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the store's item-URL column.
    ///
    /// An unreadable store starts an empty ledger rather than failing the run.
    pub fn seed(store: &CsvStore) -> Self {
        match store.item_urls() {
            Ok(urls) => {
                let ledger = Self::from_urls(urls);
                if !ledger.is_empty() {
                    info!(
                        "Resuming: {} items already in {}",
                        ledger.len(),
                        store.path().display()
                    );
                }
                ledger
            }
            Err(e) => {
                warn!(
                    "Could not read existing items from {}: {}; starting fresh",
                    store.path().display(),
                    e
                );
                Self::new()
            }
        }
    }

    pub fn from_urls<I: IntoIterator<Item = String>>(urls: I) -> Self {
        Self {
            seen: urls.into_iter().collect(),
        }
    }

    pub fn has(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn add(&mut self, url: &str) {
        self.seen.insert(url.to_string());
    }

    /// Check-then-add in one step. Returns true if `url` was new.
    pub fn claim(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visited_set_counts_attempts_across_forget() {
        let mut visited = VisitedSet::new();
        assert!(visited.mark("a"));
        assert!(!visited.mark("a"));
        assert_eq!(visited.attempts("a"), 1);

        visited.forget("a");
        assert!(!visited.contains("a"));
        assert!(visited.mark("a"));
        assert_eq!(visited.attempts("a"), 2);
        assert_eq!(visited.attempts("b"), 0);
    }

    #[test]
    fn claim_is_check_then_add() {
        let mut ledger = DedupLedger::from_urls(vec!["x".to_string()]);
        assert!(ledger.has("x"));
        assert!(!ledger.claim("x"));
        assert!(ledger.claim("y"));
        assert!(!ledger.claim("y"));
        ledger.add("z");
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn seed_keeps_items_written_before_a_crash() {
        use crate::models::ItemRecord;
        use crate::repository::ItemSink;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        let records: Vec<_> = (0..100)
            .map(|i| ItemRecord::not_found(&format!("https://s/products/{}", i)))
            .collect();
        store.append(&records).unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"not found,not found,https://s/products/100,http")
            .unwrap();
        drop(file);

        let ledger = DedupLedger::seed(&CsvStore::open(&path).unwrap());
        assert_eq!(ledger.len(), 100);
        assert!(ledger.has("https://s/products/99"));
        assert!(!ledger.has("https://s/products/100"));
    }
}
