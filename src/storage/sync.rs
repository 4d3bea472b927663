// src/storage/sync.rs
use crate::edgar::models::FilingRecord;
use crate::storage::{FeedExtractor, FilingStore};
use crate::utils::error::{EdgarError, StorageError};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_LAST_N_DAYS: u32 = 30;

// --- Date Range ---

/// Days `[start, end)`, one daily feed per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FeedDateRange {
    /// `end` defaults to `today`. `start` defaults to `last_n_days` before
    /// `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        last_n_days: u32,
        today: NaiveDate,
    ) -> Result<Self, StorageError> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(u64::from(last_n_days)))
                .ok_or_else(|| StorageError::DateRange(format!("{} days before {} is out of range", last_n_days, end)))?,
        };

        if start > end {
            return Err(StorageError::DateRange(format!("start {} is after end {}", start, end)));
        }
        Ok(Self { start, end })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day < end)
    }

    pub fn len(&self) -> usize {
        (self.end - self.start).num_days().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- Feed Source Seam ---

/// Where daily feed archives come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Saves the feed for `date` at `dest`. `Ok(None)` means there is no feed
    /// that day.
    async fn fetch_daily_feed(&self, date: NaiveDate, dest: &Path) -> Result<Option<PathBuf>, EdgarError>;
}

// --- Sync ---

/// What happened over a date range. One bad day never stops the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub days: usize,
    pub downloaded: usize,
    /// Days without a feed (weekends, holidays, or not cached).
    pub missing: Vec<NaiveDate>,
    /// Archives that were unpacked into the store.
    pub extracted_archives: usize,
    pub failures: Vec<(NaiveDate, String)>,
    pub records: Vec<FilingRecord>,
}

/// Downloads and/or extracts every daily feed in a range.
pub struct FeedSync<'a, S: FeedSource> {
    source: &'a S,
    store: &'a FilingStore,
    extractor: Option<FeedExtractor<'a>>,
    download: bool,
}

impl<'a, S: FeedSource> FeedSync<'a, S> {
    pub fn new(source: &'a S, store: &'a FilingStore) -> Self {
        Self { source, store, extractor: None, download: true }
    }

    /// With `false`, only archives already in the feed cache are used.
    pub fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Extract each archive with `extractor` once it is available.
    pub fn with_extractor(mut self, extractor: FeedExtractor<'a>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub async fn run(&self, range: FeedDateRange) -> SyncReport {
        tracing::info!(
            "Syncing {} daily feeds from {} to {} (download: {}, extract: {})",
            range.len(),
            range.start,
            range.end,
            self.download,
            self.extractor.is_some()
        );

        let mut report = SyncReport::default();
        for date in range.days() {
            report.days += 1;
            if let Err(e) = self.sync_day(date, &mut report).await {
                tracing::warn!("Daily feed {} failed: {}", date, e);
                report.failures.push((date, e));
            }
        }

        tracing::info!(
            "Processing finished. Days: {}, Downloaded: {}, Missing: {}, Extracted: {}, Failures: {}",
            report.days,
            report.downloaded,
            report.missing.len(),
            report.extracted_archives,
            report.failures.len()
        );
        report
    }

    async fn sync_day(&self, date: NaiveDate, report: &mut SyncReport) -> Result<(), String> {
        let dest = self.store.feed_path(date).map_err(|e| e.to_string())?;

        let archive = if self.download {
            match self.source.fetch_daily_feed(date, &dest).await {
                Ok(Some(path)) => {
                    report.downloaded += 1;
                    path
                }
                Ok(None) => {
                    tracing::debug!("No daily feed for {}", date);
                    report.missing.push(date);
                    return Ok(());
                }
                Err(e) => return Err(e.to_string()),
            }
        } else if dest.is_file() {
            dest
        } else {
            tracing::debug!("No cached feed for {} at {}", date, dest.display());
            report.missing.push(date);
            return Ok(());
        };

        if let Some(extractor) = &self.extractor {
            let summary = extractor.extract_archive(&archive).map_err(|e| e.to_string())?;
            report.extracted_archives += 1;
            report.records.extend(summary.records);
        }
        Ok(())
    }
}
