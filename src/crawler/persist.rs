//! Batch persistence: dedup, extract, append, and spill to backup on failure.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::extract::extract;
use super::ledger::DedupLedger;
use super::profile::CompiledProfile;
use super::{CancelFlag, PageDriver};
use crate::models::{CategoryNode, ItemRecord, SourcePanel};
use crate::repository::{write_backup, ItemSink};

/// Counts for one persisted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records appended to the store.
    pub added: usize,
    /// Links already in the ledger.
    pub skipped: usize,
    /// Records written to backup files instead of the store.
    pub backed_up: usize,
    /// Records lost because both the store and the backup failed.
    pub lost: usize,
    pub backup_files: Vec<PathBuf>,
    /// The batch stopped early on cancellation.
    pub interrupted: bool,
    /// The batch stopped early on the per-run item limit.
    pub limit_reached: bool,
}

/// Writes extracted records to an [`ItemSink`] in fixed-size chunks.
pub struct BatchWriter<S> {
    sink: S,
    backup_dir: PathBuf,
    store_path: PathBuf,
    flush_every: usize,
    max_items: usize,
    extracted: usize,
}

impl<S: ItemSink> BatchWriter<S> {
    /// `store_path` names backup files; `max_items` of 0 means no limit.
    pub fn new(
        sink: S,
        backup_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        flush_every: usize,
        max_items: usize,
    ) -> Self {
        Self {
            sink,
            backup_dir: backup_dir.into(),
            store_path: store_path.into(),
            flush_every: flush_every.max(1),
            max_items,
            extracted: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Items extracted by this writer so far.
    pub fn extracted(&self) -> usize {
        self.extracted
    }

    pub fn limit_reached(&self) -> bool {
        self.max_items > 0 && self.extracted >= self.max_items
    }

    /// Extract and persist every link not already in `ledger`.
    ///
    /// Links are claimed in the ledger before extraction, so a record that
    /// ends up in a backup file is still not extracted twice in this run.
    #[allow(clippy::too_many_arguments)]
    pub async fn persist_batch<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        profile: &CompiledProfile,
        ledger: &mut DedupLedger,
        links: &[String],
        origin: &CategoryNode,
        panel: SourcePanel,
        cancel: &CancelFlag,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut pending: Vec<ItemRecord> = Vec::new();

        for url in links {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }
            if self.limit_reached() {
                outcome.limit_reached = true;
                break;
            }
            if !ledger.claim(url) {
                info!("Skipping {} (already extracted)", url);
                outcome.skipped += 1;
                continue;
            }

            let record = extract(driver, url, profile, panel == SourcePanel::Parent).await;
            self.extracted += 1;
            pending.push(record);

            if pending.len() >= self.flush_every {
                self.flush(origin, &mut pending, &mut outcome);
            }
        }
        self.flush(origin, &mut pending, &mut outcome);

        info!(
            "{} [{}]: {} new, {} skipped{}",
            origin,
            panel,
            outcome.added + outcome.backed_up,
            outcome.skipped,
            if outcome.backed_up > 0 {
                format!(", {} to backup", outcome.backed_up)
            } else {
                String::new()
            }
        );
        outcome
    }

    fn flush(
        &mut self,
        origin: &CategoryNode,
        pending: &mut Vec<ItemRecord>,
        outcome: &mut BatchOutcome,
    ) {
        if pending.is_empty() {
            return;
        }

        match self.sink.append(pending) {
            Ok(()) => outcome.added += pending.len(),
            Err(e) => {
                warn!(
                    "Could not append {} records to {}: {}",
                    pending.len(),
                    self.sink.describe(),
                    e
                );
                match write_backup(&self.backup_dir, &self.store_path, origin, pending) {
                    Ok(path) => {
                        outcome.backed_up += pending.len();
                        outcome.backup_files.push(path);
                    }
                    Err(e) => {
                        let urls: Vec<&str> = pending.iter().map(|r| r.item_url.as_str()).collect();
                        error!(
                            "Backup for {} also failed ({}); lost records: {}",
                            origin,
                            e,
                            urls.join(", ")
                        );
                        outcome.lost += pending.len();
                    }
                }
            }
        }
        pending.clear();
    }
}
