//! Spill files for batches the store could not accept.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use super::StoreError;
use crate::models::{CategoryNode, ItemRecord, COLUMNS};

/// Backup file name for a batch from `origin` taken at `at`.
///
/// `<store-stem>_backup_<origin-slug>_<YYYYmmdd_HHMMSS>.csv`
pub fn backup_file_name(store_path: &Path, origin: &CategoryNode, at: DateTime<Local>) -> String {
    let stem = store_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "items".to_string());
    format!(
        "{}_backup_{}_{}.csv",
        stem,
        origin.slug(),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write `records` to a new backup file in `dir` and return its path.
///
/// The file uses the store's header and column order. An existing file is
/// never overwritten; a numeric suffix is appended instead.
pub fn write_backup(
    dir: &Path,
    store_path: &Path,
    origin: &CategoryNode,
    records: &[ItemRecord],
) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir)?;

    let name = backup_file_name(store_path, origin, Local::now());
    let base = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.clone());

    let mut suffix = 0u32;
    let (path, file) = loop {
        let candidate = if suffix == 0 {
            dir.join(&name)
        } else {
            dir.join(format!("{}_{}.csv", base, suffix))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => break (candidate, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;

    warn!(
        "Wrote {} records from {} to backup {}",
        records.len(),
        origin,
        path.display()
    );
    Ok(path)
}
