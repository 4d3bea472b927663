// src/storage/feed.rs
use crate::edgar::filing::LocalCache;
use crate::edgar::identifiers::{accession_from_file_name, normalize_cik, Accession, FilingId};
use crate::edgar::models::FilingRecord;
use crate::extractors::encoding::decode_filing_bytes;
use crate::extractors::header::{get_header, parse_sgml_flat, DuplicatePolicy};
use crate::storage::FilingStore;
use crate::utils::error::StorageError;
use encoding_rs::Encoding;
use flate2::read::GzDecoder;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Counts for one archive. `total` covers every member that looked like a
/// filing; `extracted` the ones that passed the filters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedSummary {
    pub extracted: usize,
    pub total: usize,
    pub records: Vec<FilingRecord>,
}

/// Unpacks daily feed archives (`YYYYMMDD.nc.tar.gz`) into a `FilingStore`.
pub struct FeedExtractor<'a> {
    store: &'a FilingStore,
    keep_regex: Option<Regex>,
    feed_encoding: &'static Encoding,
    overwrite: bool,
}

impl<'a> FeedExtractor<'a> {
    pub fn new(store: &'a FilingStore, feed_encoding: &'static Encoding) -> Self {
        Self { store, keep_regex: None, feed_encoding, overwrite: true }
    }

    /// Only keep filings whose form type matches.
    pub fn with_keep_regex(mut self, keep_regex: Option<Regex>) -> Self {
        self.keep_regex = keep_regex;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Extracts every filing in the archive. Problems with a single member
    /// are logged and skipped; only an unreadable archive is an error.
    pub fn extract_archive<P: AsRef<Path>>(&self, archive_path: P) -> Result<FeedSummary, StorageError> {
        let archive_path = archive_path.as_ref();
        let file = File::open(archive_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(archive_path.to_path_buf()),
            _ => StorageError::IoError(e),
        })?;

        tracing::info!("Extracting feed archive {}", archive_path.display());
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let entries = archive
            .entries()
            .map_err(|e| StorageError::Archive(format!("{}: {}", archive_path.display(), e)))?;

        let mut summary = FeedSummary::default();
        for entry in entries {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Stopping at unreadable member in {}: {}", archive_path.display(), e);
                    break;
                }
            };

            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(e) => {
                    tracing::warn!("Skipping member with bad path: {}", e);
                    continue;
                }
            };
            if name.len() < 3 || name.contains(".corr") || !name.ends_with(".nc") {
                continue;
            }
            summary.total += 1;

            let mut bytes = Vec::new();
            if let Err(e) = entry.read_to_end(&mut bytes) {
                tracing::warn!("Could not read {} ({}/{} extracted): {}", name, summary.extracted, summary.total, e);
                continue;
            }

            match self.extract_member(&name, &bytes) {
                Ok(Some(record)) => {
                    summary.extracted += 1;
                    summary.records.push(record);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Skipping {} ({}/{} extracted): {}", name, summary.extracted, summary.total, e);
                }
            }
        }

        tracing::info!(
            "Extracted {}/{} filings from {}",
            summary.extracted,
            summary.total,
            archive_path.display()
        );
        Ok(summary)
    }

    /// Handles one `.nc` member. `Ok(None)` means the form type was filtered
    /// out.
    pub fn extract_member(&self, name: &str, bytes: &[u8]) -> Result<Option<FilingRecord>, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Archive("member is empty".to_string()));
        }

        let decoded = decode_filing_bytes(bytes, self.feed_encoding);
        let text = decoded.text.as_str();

        if let Some(keep_regex) = &self.keep_regex {
            let form_type = match get_header(text, "FORM-TYPE", 0, None) {
                found if !found.is_empty() => found,
                _ => get_header(text, "TYPE", 0, None),
            };
            if form_type.is_empty() {
                return Err(StorageError::Archive("no form type found".to_string()));
            }
            if !keep_regex.is_match(&form_type) {
                tracing::trace!("Filtered out {} ({})", name, form_type);
                return Ok(None);
            }
        }

        let raw_cik = get_header(text, "CIK", 0, None);
        if raw_cik.is_empty() {
            let preview: String = text.chars().take(250).collect();
            return Err(StorageError::Archive(format!("no CIK found in {:?}", preview)));
        }
        let cik = normalize_cik(&raw_cik).map_err(|e| StorageError::Archive(e.to_string()))?;

        let raw_accession = get_header(text, "ACCESSION-NUMBER", 0, None);
        let accession = if raw_accession.is_empty() {
            accession_from_file_name(name)
                .ok_or_else(|| StorageError::Archive(format!("no accession in headers or name {:?}", name)))?
        } else {
            Accession::parse(&raw_accession).map_err(|e| StorageError::Archive(e.to_string()))?
        };

        let id = FilingId { cik, accession };
        let local_path = match self.store.write_filing(&id, text, self.overwrite)? {
            Some(path) => Some(path),
            None => Some(self.store.path_for(&id)?),
        };

        let headers = parse_sgml_flat(text, 0, None, DuplicatePolicy::Omit);
        let mut record = FilingRecord::new(id).with_headers(&headers);
        record.local_path = local_path;
        record.encoding = Some(decoded.encoding.name().to_string());
        record.decode_mode = Some(decoded.mode);
        Ok(Some(record))
    }
}
