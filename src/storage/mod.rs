// src/storage/mod.rs
pub mod feed;
pub mod sync;
pub mod template;

use crate::config::EdgarConfig;
use crate::edgar::filing::LocalCache;
use crate::edgar::identifiers::FilingId;
use crate::edgar::models::FilingRecord;
use crate::extractors::encoding::decode_with_chain;
use crate::utils::error::StorageError;
use chrono::NaiveDate;
use encoding_rs::{Encoding, UTF_8};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use template::PathTemplate;

pub use feed::{FeedExtractor, FeedSummary};
pub use sync::{FeedDateRange, FeedSource, FeedSync, SyncReport};

/// Local copy of EDGAR: one file per filing under `filing_root`, laid out by
/// the filing path template. Filings are always written as UTF-8; `encoding`
/// is only the fallback for files placed there by other tools.
#[derive(Debug, Clone)]
pub struct FilingStore {
    filing_root: PathBuf,
    filing_template: PathTemplate,
    feed_root: PathBuf,
    feed_template: PathTemplate,
    encoding: &'static Encoding,
}

impl FilingStore {
    /// Creates a store over the given roots. Nothing is touched on disk
    /// until the first write.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        filing_root: P,
        filing_template: PathTemplate,
        feed_root: Q,
        feed_template: PathTemplate,
        encoding: &'static Encoding,
    ) -> Self {
        Self {
            filing_root: filing_root.as_ref().to_path_buf(),
            filing_template,
            feed_root: feed_root.as_ref().to_path_buf(),
            feed_template,
            encoding,
        }
    }

    pub fn from_config(config: &EdgarConfig) -> Self {
        Self::new(
            &config.filing_root,
            config.filing_template.clone(),
            &config.feed_cache_root,
            config.feed_template.clone(),
            config.filing_encoding,
        )
    }

    pub fn filing_root(&self) -> &Path {
        &self.filing_root
    }

    /// Where the daily feed archive for `date` is cached.
    pub fn feed_path(&self, date: NaiveDate) -> Result<PathBuf, StorageError> {
        Ok(self.feed_root.join(self.feed_template.render_feed(date)?))
    }

    pub fn contains(&self, id: &FilingId) -> bool {
        self.path_for(id).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Writes the full filing text. Returns `None` when the file already
    /// exists and `overwrite` is off.
    pub fn write_filing(&self, id: &FilingId, text: &str, overwrite: bool) -> Result<Option<PathBuf>, StorageError> {
        let file_path = self.path_for(id)?;

        if !overwrite && file_path.exists() {
            tracing::debug!("Keeping existing {}", file_path.display());
            return Ok(None);
        }

        // Sometimes the containing dir doesn't exist yet
        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::IoError)?;
            }
        }

        let mut file = fs::File::create(&file_path).map_err(StorageError::IoError)?;
        file.write_all(text.as_bytes()).map_err(StorageError::IoError)?;

        tracing::debug!("Saved filing {} to {}", id, file_path.display());
        Ok(Some(file_path))
    }

    /// Saves a manifest of extracted filings in JSON format
    pub fn save_records<P: AsRef<Path>>(&self, records: &[FilingRecord], out_path: P) -> Result<PathBuf, StorageError> {
        let out_path = out_path.as_ref().to_path_buf();
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(StorageError::IoError)?;
            }
        }

        let manifest = serde_json::json!({
            "filing_root": self.filing_root,
            "record_count": records.len(),
            "records": records,
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });

        let manifest_str = serde_json::to_string_pretty(&manifest)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&out_path, manifest_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved {} records to {}", records.len(), out_path.display());
        Ok(out_path)
    }
}

impl LocalCache for FilingStore {
    fn path_for(&self, id: &FilingId) -> Result<PathBuf, StorageError> {
        Ok(self.filing_root.join(self.filing_template.render_filing(id)?))
    }

    fn read_filing(&self, id: &FilingId) -> Result<String, StorageError> {
        let file_path = self.path_for(id)?;
        let bytes = match fs::read(&file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(file_path)),
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let decoded = decode_with_chain(&bytes, &[UTF_8, self.encoding]);
        tracing::debug!(
            "Read {} bytes from {} ({} {})",
            bytes.len(),
            file_path.display(),
            decoded.encoding.name(),
            decoded.mode
        );
        Ok(decoded.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::template::{DEFAULT_FEED_TEMPLATE, DEFAULT_FILING_TEMPLATE};
    use encoding_rs::WINDOWS_1252;

    fn store(root: &Path) -> FilingStore {
        FilingStore::new(
            root.join("filings"),
            PathTemplate::for_filings(DEFAULT_FILING_TEMPLATE).unwrap(),
            root.join("feeds"),
            PathTemplate::for_feeds(DEFAULT_FEED_TEMPLATE).unwrap(),
            UTF_8,
        )
    }

    fn id() -> FilingId {
        FilingId::new(2098, "0001026608-05-000015").unwrap()
    }

    #[test]
    fn test_path_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(
            store.path_for(&id()).unwrap(),
            dir.path().join("filings").join("05/0001026608-05-000015.nc")
        );
        assert_eq!(
            store.feed_path(NaiveDate::from_ymd_opt(2005, 1, 3).unwrap()).unwrap(),
            dir.path().join("feeds").join("sec_daily_2005-01-03.tar.gz")
        );
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(!store.contains(&id()));

        let written = store.write_filing(&id(), "<SEC-HEADER>\nbody\n", true).unwrap();
        assert!(written.is_some());
        assert!(store.contains(&id()));
        assert_eq!(store.read_filing(&id()).unwrap(), "<SEC-HEADER>\nbody\n");
    }

    #[test]
    fn test_single_byte_store_round_trips_non_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilingStore::new(
            dir.path().join("filings"),
            PathTemplate::for_filings(DEFAULT_FILING_TEMPLATE).unwrap(),
            dir.path().join("feeds"),
            PathTemplate::for_feeds(DEFAULT_FEED_TEMPLATE).unwrap(),
            WINDOWS_1252,
        );

        store.write_filing(&id(), "<CONFORMED-NAME>Soci\u{e9}t\u{e9} G\u{e9}n\u{e9}rale\n", true).unwrap();
        assert_eq!(store.read_filing(&id()).unwrap(), "<CONFORMED-NAME>Soci\u{e9}t\u{e9} G\u{e9}n\u{e9}rale\n");

        // A latin-1 file dropped in by hand still reads through the fallback
        fs::write(store.path_for(&id()).unwrap(), b"caf\xe9").unwrap();
        assert_eq!(store.read_filing(&id()).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn test_no_overwrite_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.write_filing(&id(), "first", true).unwrap();
        assert!(store.write_filing(&id(), "second", false).unwrap().is_none());
        assert_eq!(store.read_filing(&id()).unwrap(), "first");
    }

    #[test]
    fn test_missing_filing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(store.read_filing(&id()), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_save_records_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let records = vec![FilingRecord::new(id())];
        let out = store.save_records(&records, dir.path().join("out/manifest.json")).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(json["record_count"], 1);
        assert_eq!(json["records"][0]["cik"], 2098);
    }
}
