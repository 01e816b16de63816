//! CSV-backed item store.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{ItemSink, StoreError};
use crate::models::{ItemRecord, COLUMNS, ITEM_URL_COLUMN, NOT_FOUND};

/// How the store was found when it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// No usable file existed; a fresh one was created.
    Created,
    /// An existing, well-formed store is being appended to.
    Resumed { rows: usize },
    /// The store ended with an unfinished row, which was cut off.
    Repaired { rows: usize, dropped_bytes: u64 },
    /// The existing file was unreadable and moved aside before recreating.
    Recreated { moved_to: PathBuf },
}

/// Summary of a store's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: usize,
    pub unique_urls: usize,
    /// URLs that appear on more than one row.
    pub duplicate_urls: Vec<String>,
    /// Rows whose title is the sentinel (usually failed extractions).
    pub rows_without_title: usize,
}

/// Append-only CSV store with a fixed header.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    mode: StoreMode,
    /// Bytes readers may consume; set when an inspected store has a torn tail.
    readable_len: Option<u64>,
}

/// Outcome of scanning an existing store.
#[derive(Debug, PartialEq, Eq)]
enum Scan {
    /// Every row is complete.
    Clean { rows: usize },
    /// Only the last row is unfinished; it starts at byte `keep`.
    Torn { rows: usize, keep: u64 },
}

impl CsvStore {
    /// Open `path`, creating it or validating an existing file.
    ///
    /// An unfinished last row, as left by a crash in the middle of an append,
    /// is cut off and the store resumes. A file with a foreign header or
    /// malformed rows elsewhere is renamed to `<name>.corrupt-<timestamp>` and
    /// replaced by an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let is_empty = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if is_empty {
            write_header(&path)?;
            debug!("Created store {}", path.display());
            return Ok(Self {
                path,
                mode: StoreMode::Created,
                readable_len: None,
            });
        }

        let mode = match scan(&path) {
            Ok(Scan::Clean { rows }) => {
                info!("Opened existing store {} ({} rows)", path.display(), rows);
                StoreMode::Resumed { rows }
            }
            Ok(Scan::Torn { rows, keep }) => {
                let dropped_bytes = truncate(&path, keep)?;
                warn!(
                    "Store {} ended with an incomplete row; dropped {} bytes, kept {} rows",
                    path.display(),
                    dropped_bytes,
                    rows
                );
                StoreMode::Repaired {
                    rows,
                    dropped_bytes,
                }
            }
            Err(e) => {
                let moved_to = corrupt_path(&path);
                warn!(
                    "Store {} is unreadable ({}); moving it to {} and starting fresh",
                    path.display(),
                    e,
                    moved_to.display()
                );
                fs::rename(&path, &moved_to)?;
                write_header(&path)?;
                StoreMode::Recreated { moved_to }
            }
        };

        Ok(Self {
            path,
            mode,
            readable_len: None,
        })
    }

    /// Open an existing store read-only, failing instead of recreating it.
    ///
    /// An unfinished last row is left on disk and skipped by readers.
    pub fn inspect(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (rows, readable_len) = match scan(&path)? {
            Scan::Clean { rows } => (rows, None),
            Scan::Torn { rows, keep } => {
                warn!(
                    "Store {} ends with an incomplete row; the next crawl cuts it off",
                    path.display()
                );
                (rows, Some(keep))
            }
        };
        Ok(Self {
            path,
            mode: StoreMode::Resumed { rows },
            readable_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> &StoreMode {
        &self.mode
    }

    /// Every value of the item URL column, in file order.
    pub fn item_urls(&self) -> Result<Vec<String>, StoreError> {
        let mut reader = self.reader()?;
        let mut urls = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let Some(url) = record.get(ITEM_URL_COLUMN) {
                if !url.is_empty() {
                    urls.push(url.to_string());
                }
            }
        }
        Ok(urls)
    }

    /// Read every record.
    pub fn read_all(&self) -> Result<Vec<ItemRecord>, StoreError> {
        let mut reader = self.reader()?;
        let mut records = Vec::new();
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(records)
    }

    fn reader(&self) -> Result<csv::Reader<io::Take<File>>, StoreError> {
        let file = File::open(&self.path)?;
        let limit = self.readable_len.unwrap_or(u64::MAX);
        Ok(csv::ReaderBuilder::new().from_reader(file.take(limit)))
    }

    /// Row count, uniqueness and sentinel statistics.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.read_all()?;
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for record in &records {
            if !seen.insert(record.item_url.as_str()) && !duplicates.contains(&record.item_url) {
                duplicates.push(record.item_url.clone());
            }
        }

        Ok(StoreStats {
            rows: records.len(),
            unique_urls: seen.len(),
            duplicate_urls: duplicates,
            rows_without_title: records.iter().filter(|r| r.title == NOT_FOUND).count(),
        })
    }
}

impl ItemSink for CsvStore {
    fn append(&mut self, records: &[ItemRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        // The file may have been removed or truncated since open
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let bytes = encode_rows(records, needs_header)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        write_whole(&mut file, &bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An append target that can be cut back to an earlier length.
trait Rewind: Write {
    fn end(&self) -> io::Result<u64>;
    fn cut_to(&mut self, len: u64) -> io::Result<()>;
}

impl Rewind for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn cut_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Serialize `records` as CSV rows, optionally preceded by the header.
fn encode_rows(records: &[ItemRecord], header: bool) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if header {
        writer.write_record(COLUMNS)?;
    }
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

/// Write all of `bytes`, or cut `out` back to its previous length.
fn write_whole<W: Rewind>(out: &mut W, bytes: &[u8]) -> Result<(), StoreError> {
    let start = out.end()?;
    if let Err(e) = out.write_all(bytes).and_then(|()| out.flush()) {
        if let Err(undo) = out.cut_to(start) {
            warn!("Could not roll back a partial append to the store: {}", undo);
        }
        return Err(e.into());
    }
    Ok(())
}

fn write_header(path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(COLUMNS)?;
    writer.flush()?;
    Ok(())
}

/// Check the header and every row.
///
/// A bad or unterminated final row is reported as a torn tail instead of an
/// error. Appends always end with a newline, so anything after the last one
/// was never completely written.
fn scan(path: &Path) -> Result<Scan, StoreError> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    let headers = reader.headers()?.clone();
    if !headers.iter().eq(COLUMNS.iter().copied()) {
        return Err(StoreError::Header {
            path: path.to_path_buf(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut record = csv::StringRecord::new();
    let mut rows = 0;
    let mut last_start = reader.position().byte();
    loop {
        let start = reader.position().byte();
        match reader.read_record(&mut record) {
            Ok(true) => {
                rows += 1;
                last_start = start;
            }
            Ok(false) => break,
            Err(e) => {
                return match reader.read_record(&mut record) {
                    Ok(false) => Ok(Scan::Torn { rows, keep: start }),
                    _ => Err(e.into()),
                };
            }
        }
    }

    if rows > 0 && !ends_with_newline(path)? {
        return Ok(Scan::Torn {
            rows: rows - 1,
            keep: last_start,
        });
    }
    Ok(Scan::Clean { rows })
}

fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Cut `path` to `len` bytes; returns how many were dropped.
fn truncate(path: &Path, len: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let before = file.metadata()?.len();
    file.set_len(len)?;
    Ok(before.saturating_sub(len))
}

fn corrupt_path(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!("{}.corrupt-{}", name, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(url: &str, title: &str) -> ItemRecord {
        let mut r = ItemRecord::not_found(url);
        r.title = title.to_string();
        r.description = "line one\nline two, with comma".to_string();
        r
    }

    #[test]
    fn creates_store_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("items.csv");
        let store = CsvStore::open(&path).unwrap();

        assert_eq!(store.mode(), &StoreMode::Created);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim_end(), COLUMNS.join(","));
        assert!(store.item_urls().unwrap().is_empty());
    }

    #[test]
    fn appends_and_resumes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");

        let mut store = CsvStore::open(&path).unwrap();
        store
            .append(&[record("https://s/p/1", "One"), record("https://s/p/2", "Two")])
            .unwrap();
        store.append(&[record("https://s/p/3", "Three")]).unwrap();

        let reopened = CsvStore::open(&path).unwrap();
        assert_eq!(reopened.mode(), &StoreMode::Resumed { rows: 3 });
        assert_eq!(
            reopened.item_urls().unwrap(),
            vec!["https://s/p/1", "https://s/p/2", "https://s/p/3"]
        );

        let all = reopened.read_all().unwrap();
        assert_eq!(all[1].title, "Two");
        assert_eq!(all[1].description, "line one\nline two, with comma");
        assert_eq!(all[1].publisher, NOT_FOUND);
    }

    #[test]
    fn foreign_file_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        fs::write(&path, "url,name\nhttps://x,abc\n").unwrap();

        let store = CsvStore::open(&path).unwrap();
        let moved_to = match store.mode() {
            StoreMode::Recreated { moved_to } => moved_to.clone(),
            other => panic!("unexpected mode {:?}", other),
        };

        assert_eq!(fs::read_to_string(&moved_to).unwrap(), "url,name\nhttps://x,abc\n");
        assert!(store.item_urls().unwrap().is_empty());
    }

    #[test]
    fn inspect_does_not_touch_foreign_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        fs::write(&path, "url,name\n").unwrap();

        assert!(matches!(CsvStore::inspect(&path), Err(StoreError::Header { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "url,name\n");
        assert!(CsvStore::inspect(dir.path().join("missing.csv")).is_err());
    }

    #[test]
    fn stats_report_duplicates() {
        let dir = tempdir().unwrap();
        let mut store = CsvStore::open(dir.path().join("items.csv")).unwrap();
        store
            .append(&[
                record("https://s/p/1", "One"),
                record("https://s/p/1", NOT_FOUND),
                record("https://s/p/2", "Two"),
            ])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.unique_urls, 2);
        assert_eq!(stats.duplicate_urls, vec!["https://s/p/1"]);
        assert_eq!(stats.rows_without_title, 1);
    }

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn partial_last_row_is_cut_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        let records: Vec<_> = (0..100)
            .map(|i| record(&format!("https://s/products/{}", i), "Book"))
            .collect();
        store.append(&records).unwrap();
        let intact = fs::metadata(&path).unwrap().len();

        append_raw(&path, b"Book,x,y,z,https://s/products/100,http");

        let mut reopened = CsvStore::open(&path).unwrap();
        assert_eq!(
            reopened.mode(),
            &StoreMode::Repaired {
                rows: 100,
                dropped_bytes: 38
            }
        );
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);
        assert_eq!(reopened.item_urls().unwrap().len(), 100);

        reopened.append(&[record("https://s/products/100", "Last")]).unwrap();
        let again = CsvStore::open(&path).unwrap();
        assert_eq!(again.mode(), &StoreMode::Resumed { rows: 101 });
    }

    #[test]
    fn unterminated_last_row_is_dropped_even_when_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        store.append(&[record("https://s/p/1", "One")]).unwrap();

        let mut torn = encode_rows(&[record("https://s/p/2", "Two")], false).unwrap();
        assert_eq!(torn.pop(), Some(b'\n'));
        append_raw(&path, &torn);

        let reopened = CsvStore::open(&path).unwrap();
        assert!(matches!(
            reopened.mode(),
            StoreMode::Repaired { rows: 1, .. }
        ));
        assert_eq!(reopened.item_urls().unwrap(), vec!["https://s/p/1"]);
    }

    #[test]
    fn malformed_row_before_good_rows_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        store.append(&[record("https://s/p/1", "One")]).unwrap();
        append_raw(&path, b"short,row\n");
        store.append(&[record("https://s/p/2", "Two")]).unwrap();

        let reopened = CsvStore::open(&path).unwrap();
        assert!(matches!(reopened.mode(), StoreMode::Recreated { .. }));
        assert!(reopened.item_urls().unwrap().is_empty());
    }

    #[test]
    fn inspect_skips_partial_last_row_without_cutting_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        store.append(&[record("https://s/p/1", "One")]).unwrap();
        append_raw(&path, b"Two,https://s/p/2");
        let before = fs::read(&path).unwrap();

        let inspected = CsvStore::inspect(&path).unwrap();
        assert_eq!(inspected.mode(), &StoreMode::Resumed { rows: 1 });
        assert_eq!(inspected.stats().unwrap().rows, 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    /// File handle that accepts `budget` bytes, then fails.
    struct ShortOfSpace {
        file: File,
        budget: usize,
    }

    impl Write for ShortOfSpace {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.budget);
            self.file.write_all(&buf[..n])?;
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl Rewind for ShortOfSpace {
        fn end(&self) -> io::Result<u64> {
            self.file.end()
        }

        fn cut_to(&mut self, len: u64) -> io::Result<()> {
            self.file.cut_to(len)
        }
    }

    #[test]
    fn failed_append_leaves_no_partial_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut store = CsvStore::open(&path).unwrap();
        store.append(&[record("https://s/p/1", "One")]).unwrap();
        let before = fs::read(&path).unwrap();

        let batch: Vec<_> = (2..30)
            .map(|i| record(&format!("https://s/p/{}", i), "Book"))
            .collect();
        let bytes = encode_rows(&batch, false).unwrap();
        let mut out = ShortOfSpace {
            file: OpenOptions::new().append(true).open(&path).unwrap(),
            budget: bytes.len() / 2,
        };

        assert!(matches!(write_whole(&mut out, &bytes), Err(StoreError::Io(_))));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(
            CsvStore::open(&path).unwrap().mode(),
            &StoreMode::Resumed { rows: 1 }
        );
    }
}
