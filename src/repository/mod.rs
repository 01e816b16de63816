//! Repository layer for item persistence.
//!
//! Items are stored in an append-only CSV file with a fixed header. When the
//! store rejects a batch, the batch is spilled to a timestamped backup file.

mod backup;
mod csv_store;

pub use backup::{backup_file_name, write_backup};
pub use csv_store::{CsvStore, StoreMode, StoreStats};

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ItemRecord;

/// Errors that can occur while reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected header in {path}: {found:?}")]
    Header { path: PathBuf, found: Vec<String> },
}

/// Destination for extracted records.
pub trait ItemSink {
    /// Append `records` in order. Either all rows are written or an error is
    /// returned.
    fn append(&mut self, records: &[ItemRecord]) -> Result<(), StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
